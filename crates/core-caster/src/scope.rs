//! Scoped overrides on the caster.
//!
//! `with_scope` snapshots the override-relevant slice of caster state
//! (carrier, standing options, mode bits), applies a `ScopeCtx`, runs the
//! closure, and restores the snapshot on every exit path, including the
//! error one. Buffered data is flushed on both edges of the scope whenever
//! the override would otherwise bleed into a line it does not own.

use crate::{CastMode, Caster};
use core_bed::CompileError;
use core_code::LineOptions;

/// Overrides applied for the duration of one `with_scope` call.
#[derive(Debug, Clone, Default)]
pub struct ScopeCtx {
    carrier: Option<u8>,
    replace_options: Option<LineOptions>,
    merge_options: Option<LineOptions>,
    set_mode: CastMode,
    clear_mode: CastMode,
}

impl ScopeCtx {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn carrier(mut self, carrier: u8) -> Self {
        self.carrier = Some(carrier);
        self
    }

    /// Replace the standing options inside the scope.
    pub fn options(mut self, options: LineOptions) -> Self {
        self.replace_options = Some(options);
        self
    }

    /// Merge over the standing options inside the scope.
    pub fn merge(mut self, options: LineOptions) -> Self {
        self.merge_options = Some(options);
        self
    }

    pub fn with_mode(mut self, mode: CastMode) -> Self {
        self.set_mode |= mode;
        self
    }

    pub fn without_mode(mut self, mode: CastMode) -> Self {
        self.clear_mode |= mode;
        self
    }

    fn affects_lines(&self, caster: &Caster<'_>) -> bool {
        self.carrier.is_some_and(|c| c != caster.carrier)
            || self.replace_options.is_some()
            || self.merge_options.is_some()
    }
}

impl<'r> Caster<'r> {
    /// Run `f` under the overrides of `ctx`, restoring the prior context on
    /// all exit paths. Lines produced inside the scope are committed before
    /// the restore so the overridden options cannot leak across the edge.
    pub fn with_scope<T>(
        &mut self,
        ctx: &ScopeCtx,
        f: impl FnOnce(&mut Self) -> Result<T, CompileError>,
    ) -> Result<T, CompileError> {
        let affects = ctx.affects_lines(self);
        if affects && self.has_buffered() {
            self.flush(None, None)?;
        }

        let saved_carrier = self.carrier;
        let saved_options = self.options.clone();
        let saved_mode = self.mode;

        if let Some(carrier) = ctx.carrier {
            self.carrier = carrier;
        }
        if let Some(options) = &ctx.replace_options {
            self.options = options.clone();
        }
        if let Some(options) = &ctx.merge_options {
            self.options.merge(options);
        }
        self.mode |= ctx.set_mode;
        self.mode -= ctx.clear_mode;

        let result = f(self);

        let edge_flush = if result.is_ok() && affects && self.has_buffered() {
            self.flush(None, None).map(|_| ())
        } else {
            Ok(())
        };

        self.carrier = saved_carrier;
        self.options = saved_options;
        self.mode = saved_mode;

        let value = result?;
        edge_flush?;
        Ok(value)
    }

    /// Run `f`, then restore the carrier's committed needle, side, and
    /// direction. Transfer block emission goes through here so the planner
    /// cannot disturb where the yarn actually stands.
    pub fn locally<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, CompileError>,
    ) -> Result<T, CompileError> {
        let saved = (self.current, self.side, self.dir);
        let result = f(self);
        self.current = saved.0;
        self.side = saved.1;
        self.dir = saved.2;
        result
    }
}
