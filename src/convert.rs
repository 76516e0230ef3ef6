//! Rhai-based channel value converters
//!
//! Channels may carry an optional converter script that maps the stored
//! (calibrated, zero-corrected) value to a display value — unit scaling,
//! linearization, deadbands. Scripts see the current value as `value`
//! (alias `raw`) and must return a number.
//!
//! Scripts are compiled once and cached by source text. Conversion happens
//! at query time in the aggregation path, so a failing script never
//! corrupts stored data; the caller degrades to the unconverted value.

use rhai::{Dynamic, Engine, Scope, AST};
use std::collections::HashMap;

use crate::error::{LoadMonError, Result};

/// Script engine with a compiled-AST cache for channel converters
#[derive(Debug)]
pub struct ConverterEngine {
    /// The Rhai engine instance
    engine: Engine,
    /// Compiled scripts keyed by source text
    cache: HashMap<String, AST>,
}

impl ConverterEngine {
    /// Create a new converter engine with safety limits applied
    pub fn new() -> Self {
        let mut engine = Engine::new();
        Self::configure_engine(&mut engine);
        Self {
            engine,
            cache: HashMap::new(),
        }
    }

    /// Configure the Rhai engine with built-in functions and safety limits
    fn configure_engine(engine: &mut Engine) {
        engine.set_max_expr_depths(64, 64);
        engine.set_max_call_levels(32);
        engine.set_max_operations(10_000);
        engine.set_max_string_size(10_000);
        engine.set_max_array_size(1_000);
        engine.set_max_map_size(1_000);

        // Deadband: zero out small values around a center point
        // Usage: deadband(value, center, width)
        engine.register_fn("deadband", |value: f64, center: f64, width: f64| -> f64 {
            if (value - center).abs() < width {
                center
            } else {
                value
            }
        });

        // Linear rescale: value * factor + offset
        engine.register_fn("scale_offset", |value: f64, factor: f64, offset: f64| -> f64 {
            value * factor + offset
        });
    }

    /// Number of scripts currently cached
    pub fn cached_scripts(&self) -> usize {
        self.cache.len()
    }

    /// Run a converter script against a single value.
    /// Compiles and caches the script on first use.
    pub fn apply(&mut self, script: &str, value: f64) -> Result<f64> {
        if !self.cache.contains_key(script) {
            let ast = self
                .engine
                .compile(script)
                .map_err(|e| LoadMonError::Script(e.to_string()))?;
            self.cache.insert(script.to_owned(), ast);
        }
        let Some(ast) = self.cache.get(script) else {
            return Err(LoadMonError::Script(
                "compiled script missing from cache".into(),
            ));
        };

        let mut scope = Scope::new();
        scope.push("value", value);
        scope.push("raw", value);

        let out: Dynamic = self
            .engine
            .eval_ast_with_scope(&mut scope, ast)
            .map_err(LoadMonError::from_rhai_error)?;

        if let Ok(f) = out.clone().as_float() {
            Ok(f)
        } else if let Ok(i) = out.clone().as_int() {
            Ok(i as f64)
        } else {
            Err(LoadMonError::Script(format!(
                "converter returned {}, expected a number",
                out.type_name()
            )))
        }
    }
}

impl Default for ConverterEngine {
    fn default() -> Self {
        Self::new()
    }
}
