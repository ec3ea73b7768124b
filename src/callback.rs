//! Diagnostic hooks invoked at well-defined stages of a solve.
//!
//! The protocol mirrors the two-stage dump used by the original solver's
//! logger: once after the problem is canonicalized ([`Callback::on_init`])
//! and once per outer dual iteration ([`Callback::on_iteration`]). Callbacks
//! receive shared references only; they observe, they never steer.

use std::io::Write;

use faer::{Col, Mat};

use crate::E;
use crate::status::TimingIntervals;

/// Everything produced while canonicalizing the problem, dumped once before
/// the dual active-set loop starts.
#[allow(non_snake_case)]
pub struct InitDump<'a> {
    pub Chol: &'a Mat<E>,
    pub CholInv: &'a Mat<E>,
    pub M: &'a Mat<E>,
    pub s: &'a Col<E>,
    pub c: &'a Col<E>,
    pub b: &'a Col<E>,
    pub timings: TimingIntervals,
}

/// State of a single outer dual iteration, dumped after the inner primal
/// loop converges for that iteration.
pub struct IterationDump<'a> {
    pub iteration: usize,
    pub active_set: &'a [usize],
    pub primal: &'a Col<E>,
    pub dual: &'a Col<E>,
    pub newly_added: Option<usize>,
    pub singular: bool,
}

/// Hook invoked at well-defined stages of a solve for logging or monitoring.
///
/// Implementations must not assume `on_init` or `on_iteration` are called
/// from more than one thread; the solver is single-threaded and synchronous.
pub trait Callback {
    fn on_init(&mut self, init: &InitDump);

    fn on_iteration(&mut self, iter: &IterationDump);
}

/// A callback that does nothing. The default when no diagnostics are needed.
pub struct NoOpCallback;

impl Callback for NoOpCallback {
    fn on_init(&mut self, _init: &InitDump) {}

    fn on_iteration(&mut self, _iter: &IterationDump) {}
}

/// Writes a human-readable dump of each stage to any [`std::io::Write`] sink.
///
/// Setting `cpp_braces` wraps each row in `{ ... }`, mirroring the original
/// implementation's `CPP_FORMAT` compile-time flag, which is useful when
/// diffing a dump against a log produced by that implementation.
pub struct TextDumpCallback<W: Write> {
    sink: W,
    cpp_braces: bool,
}

impl<W: Write> TextDumpCallback<W> {
    pub fn new(sink: W) -> Self {
        Self {
            sink,
            cpp_braces: false,
        }
    }

    pub fn with_cpp_braces(sink: W) -> Self {
        Self {
            sink,
            cpp_braces: true,
        }
    }

    fn row(&mut self, body: &str) {
        if self.cpp_braces {
            let _ = writeln!(self.sink, "{{ {} }}", body);
        } else {
            let _ = writeln!(self.sink, "{}", body);
        }
    }
}

impl<W: Write> Callback for TextDumpCallback<W> {
    fn on_init(&mut self, init: &InitDump) {
        self.row(&format!(
            "init: M={}x{} s.len={} c.len={} b.len={} tChol={:.3e} tInv={:.3e} tM={:.3e}",
            init.M.nrows(),
            init.M.ncols(),
            init.s.nrows(),
            init.c.nrows(),
            init.b.nrows(),
            init.timings.t_chol,
            init.timings.t_inv,
            init.timings.t_m,
        ));
    }

    fn on_iteration(&mut self, iter: &IterationDump) {
        self.row(&format!(
            "iter={} |active|={} newly_added={:?} singular={}",
            iter.iteration,
            iter.active_set.len(),
            iter.newly_added,
            iter.singular,
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_dump_wraps_rows_in_braces_when_requested() {
        let mut buf = Vec::new();
        {
            let mut cb = TextDumpCallback::with_cpp_braces(&mut buf);
            let m = Mat::<E>::zeros(2, 2);
            let s = Col::<E>::zeros(2);
            let c = Col::<E>::zeros(2);
            let b = Col::<E>::zeros(2);
            cb.on_init(&InitDump {
                Chol: &m,
                CholInv: &m,
                M: &m,
                s: &s,
                c: &c,
                b: &b,
                timings: TimingIntervals::default(),
            });
        }
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with('{'));
        assert!(text.trim_end().ends_with('}'));
    }

    #[test]
    fn noop_callback_ignores_everything() {
        let mut cb = NoOpCallback;
        let m = Mat::<E>::zeros(1, 1);
        let s = Col::<E>::zeros(1);
        cb.on_init(&InitDump {
            Chol: &m,
            CholInv: &m,
            M: &m,
            s: &s,
            c: &s,
            b: &s,
            timings: TimingIntervals::default(),
        });
        cb.on_iteration(&IterationDump {
            iteration: 0,
            active_set: &[],
            primal: &s,
            dual: &s,
            newly_added: None,
            singular: false,
        });
    }
}
