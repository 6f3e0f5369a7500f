//! Conversion between ordered JSON argument lists and typed tuples.
//!
//! Missing trailing arguments decode as `null`, so a trailing `Option<T>`
//! parameter may be omitted by the caller. Surplus arguments are rejected.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::error::ProcedureFailure;

/// Typed parameter list decoded from positional JSON arguments.
pub trait FromArgs: Sized {
    /// Number of declared parameters.
    const ARITY: usize;

    fn from_args(args: Vec<Value>) -> Result<Self, ProcedureFailure>;
}

/// Typed argument list encoded as positional JSON arguments.
pub trait IntoArgs {
    fn into_args(self) -> Result<Vec<Value>, serde_json::Error>;
}

impl IntoArgs for Vec<Value> {
    fn into_args(self) -> Result<Vec<Value>, serde_json::Error> {
        Ok(self)
    }
}

fn next_arg<T: DeserializeOwned>(
    args: &mut std::vec::IntoIter<Value>,
    index: usize,
) -> Result<T, ProcedureFailure> {
    let value = args.next().unwrap_or(Value::Null);
    serde_json::from_value(value)
        .map_err(|e| ProcedureFailure::new(format!("Invalid argument at position {index}: {e}")))
}

macro_rules! impl_args {
    ($arity:expr; $($ty:ident => $idx:tt),*) => {
        impl<$($ty,)*> FromArgs for ($($ty,)*)
        where
            $($ty: DeserializeOwned,)*
        {
            const ARITY: usize = $arity;

            #[allow(unused_mut, unused_variables)]
            fn from_args(args: Vec<Value>) -> Result<Self, ProcedureFailure> {
                if args.len() > $arity {
                    return Err(ProcedureFailure::new(format!(
                        "Expected at most {} arguments, got {}",
                        $arity,
                        args.len()
                    )));
                }
                let mut args = args.into_iter();
                Ok(($(next_arg::<$ty>(&mut args, $idx)?,)*))
            }
        }

        impl<$($ty,)*> IntoArgs for ($($ty,)*)
        where
            $($ty: Serialize,)*
        {
            #[allow(unused_variables)]
            fn into_args(self) -> Result<Vec<Value>, serde_json::Error> {
                Ok(vec![$(serde_json::to_value(&self.$idx)?,)*])
            }
        }
    };
}

impl_args!(0;);
impl_args!(1; A => 0);
impl_args!(2; A => 0, B => 1);
impl_args!(3; A => 0, B => 1, C => 2);
impl_args!(4; A => 0, B => 1, C => 2, D => 3);
impl_args!(5; A => 0, B => 1, C => 2, D => 3, E => 4);
impl_args!(6; A => 0, B => 1, C => 2, D => 3, E => 4, F => 5);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_exact_arity() {
        let (a, b) = <(i64, i64)>::from_args(vec![json!(3), json!(4)]).unwrap();
        assert_eq!(a + b, 7);
    }

    #[test]
    fn missing_trailing_option_is_none() {
        let (score, goal, message) =
            <(i64, i64, Option<String>)>::from_args(vec![json!(3), json!(9)]).unwrap();
        assert_eq!((score, goal), (3, 9));
        assert!(message.is_none());
    }

    #[test]
    fn missing_required_argument_fails() {
        let err = <(i64, i64)>::from_args(vec![json!(3)]).unwrap_err();
        assert!(err.message().contains("position 1"), "{}", err.message());
    }

    #[test]
    fn surplus_arguments_fail() {
        let err = <(String,)>::from_args(vec![json!("a"), json!("b")]).unwrap_err();
        assert_eq!(err.message(), "Expected at most 1 arguments, got 2");
    }

    #[test]
    fn wrong_type_fails() {
        assert!(<(i64,)>::from_args(vec![json!("three")]).is_err());
    }

    #[test]
    fn unit_takes_no_arguments() {
        assert!(<()>::from_args(Vec::new()).is_ok());
        assert!(<()>::from_args(vec![json!(1)]).is_err());
        assert_eq!(<() as FromArgs>::ARITY, 0);
    }

    #[test]
    fn tuples_encode_positionally() {
        let args = (3, "x", Option::<bool>::None).into_args().unwrap();
        assert_eq!(args, vec![json!(3), json!("x"), json!(null)]);
        assert!(().into_args().unwrap().is_empty());
    }
}
