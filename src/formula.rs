//! Analog conversion formulas.
//!
//! Each analog item carries an arithmetic expression over two named
//! variables, `adcval` (the raw 8-bit level) and `vref` (the configured
//! reference voltage), e.g. `adcval * (vref / 256)`. The expression is
//! compiled once at configuration load time, so malformed formulas abort
//! startup instead of failing on every read.

use evalexpr::{
    build_operator_tree, ContextWithMutableVariables, EvalexprError, HashMapContext, Node, Value,
};

use crate::error::{GatewayError, Result};

const VARIABLES: [&str; 2] = ["adcval", "vref"];

/// A compiled analog conversion formula.
#[derive(Debug, Clone)]
pub struct Formula {
    text: String,
    node: Node,
}

impl Formula {
    /// Compile an expression, rejecting any variable other than `adcval`
    /// and `vref`.
    pub fn parse(expr: &str) -> Result<Self> {
        let node = build_operator_tree(expr)?;
        for ident in node.iter_variable_identifiers() {
            if !VARIABLES.contains(&ident) {
                return Err(GatewayError::Configuration(format!(
                    "formula '{expr}' references unknown variable '{ident}'"
                )));
            }
        }
        if let Some(ident) = node.iter_function_identifiers().next() {
            return Err(GatewayError::Configuration(format!(
                "formula '{expr}' calls function '{ident}'; only arithmetic over adcval and vref is allowed"
            )));
        }
        Ok(Self {
            text: expr.to_string(),
            node,
        })
    }

    /// Evaluate the formula for one raw reading.
    pub fn eval(&self, adcval: u8, vref: f64) -> Result<f64> {
        let mut context = HashMapContext::new();
        context.set_value("adcval".to_string(), Value::Float(f64::from(adcval)))?;
        context.set_value("vref".to_string(), Value::Float(vref))?;
        match self.node.eval_with_context(&context)? {
            Value::Float(f) => Ok(f),
            Value::Int(i) => Ok(i as f64),
            other => Err(GatewayError::Expression(EvalexprError::ExpectedNumber {
                actual: other,
            })),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evaluates_standard_conversion() {
        let formula = Formula::parse("adcval * (vref / 256)").unwrap();
        assert_eq!(formula.eval(0, 5.0).unwrap(), 0.0);
        let top = formula.eval(255, 5.0).unwrap();
        assert!((top - 4.980_468_75).abs() < 1e-12);
    }

    #[test]
    fn rejects_malformed_expression() {
        assert!(Formula::parse("adcval * (").is_err());
    }

    #[test]
    fn rejects_unknown_variable() {
        let err = Formula::parse("adcval * gain").unwrap_err();
        assert!(err.to_string().contains("gain"));
    }

    #[test]
    fn rejects_function_calls() {
        assert!(Formula::parse("math::sin(adcval)").is_err());
    }

    #[test]
    fn rejects_non_numeric_result() {
        let formula = Formula::parse("adcval > vref").unwrap();
        assert!(formula.eval(10, 5.0).is_err());
    }

    #[test]
    fn integer_literals_mix_with_float_variables() {
        let formula = Formula::parse("adcval / 2 + 1").unwrap();
        assert_eq!(formula.eval(4, 0.0).unwrap(), 3.0);
    }
}
