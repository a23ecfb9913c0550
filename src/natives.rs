//! The native prelude. Every native reads its arguments back out of its own
//! environment, from the `_args0_`, `_args1_`, ... bindings the interpreter
//! sets up on each call.

use std::io::Write;
use std::rc::Rc;

use crate::ast::LiteralKind;
use crate::environment::{Env, Environment};
use crate::evaluator::{EvalError, EvalResult, Interpreter, arg_name};
use crate::source::Position;
use crate::types::{ArrayRef, Function, Value};

// Checks the number of arguments
macro_rules! check_arity {
    ($args:expr, $expected:expr, $pos:expr, $name:expr) => {
        if $args.len() != $expected {
            return Err(EvalError::InvalidArguments(
                format!(
                    "{}() expects exactly {} argument(s), got {}",
                    $name,
                    $expected,
                    $args.len()
                ),
                $pos,
            ));
        }
    };
    // Variant for minimum number of args
    ($args:expr, min $expected:expr, $pos:expr, $name:expr) => {
        if $args.len() < $expected {
            return Err(EvalError::InvalidArguments(
                format!(
                    "{}() expects at least {} argument(s), got {}",
                    $name,
                    $expected,
                    $args.len()
                ),
                $pos,
            ));
        }
    };
}

/// Collects the arguments of the current call, in order.
pub fn arguments(env: &Env) -> Vec<Value> {
    let env = env.borrow();
    (0..)
        .map_while(|i| env.get_local(&arg_name(i)))
        .collect()
}

fn expect_array(value: &Value, name: &str, pos: Position) -> EvalResult<ArrayRef> {
    match value {
        Value::Array(elements) => Ok(elements.clone()),
        other => Err(EvalError::InvalidArguments(
            format!("{}() expects an array, got {}", name, other.type_name()),
            pos,
        )),
    }
}

fn expect_function(value: &Value, name: &str, pos: Position) -> EvalResult<Rc<Function>> {
    match value {
        Value::Function(function) => Ok(function.clone()),
        other => Err(EvalError::InvalidArguments(
            format!("{}() expects a function, got {}", name, other.type_name()),
            pos,
        )),
    }
}

/// Installs the prelude into `env`.
pub fn install(env: &Env) {
    Environment::define_native(env, "echo", &[], Rc::new(native_echo));
    Environment::define_native(env, "len", &["value"], Rc::new(native_len));
    Environment::define_native(env, "push", &["array"], Rc::new(native_push));
    Environment::define_native(env, "map", &["array", "callback"], Rc::new(native_map));
    Environment::define_native(env, "filter", &["array", "callback"], Rc::new(native_filter));
    Environment::define_native(env, "typeof", &["value"], Rc::new(native_typeof));
    log::debug!("installed native prelude");
}

/// `echo(args...)`: writes the arguments separated by spaces, then a newline.
fn native_echo(interpreter: &mut Interpreter<'_>, env: &Env, pos: Position) -> EvalResult {
    let line = arguments(env)
        .iter()
        .map(|arg| arg.to_string())
        .collect::<Vec<_>>()
        .join(" ");
    writeln!(interpreter.output(), "{}", line)
        .map_err(|e| EvalError::Output(e.to_string(), pos))?;
    Ok(Value::undefined())
}

fn native_len(_: &mut Interpreter<'_>, env: &Env, pos: Position) -> EvalResult {
    let args = arguments(env);
    check_arity!(args, 1, pos, "len");
    let len = match &args[0] {
        Value::Array(elements) => elements.borrow().len(),
        Value::Object(properties) => properties.borrow().len(),
        Value::Literal(literal) if literal.kind == LiteralKind::String => {
            literal.text.chars().count()
        }
        other => {
            return Err(EvalError::InvalidArguments(
                format!("len() expects an array, string or object, got {}", other.type_name()),
                pos,
            ));
        }
    };
    Ok(Value::number(len as f64))
}

/// `push(array, values...)` appends in place and returns the array.
fn native_push(_: &mut Interpreter<'_>, env: &Env, pos: Position) -> EvalResult {
    let mut args = arguments(env).into_iter();
    let target = args.next().unwrap_or_else(Value::undefined);
    let elements = expect_array(&target, "push", pos)?;
    elements.borrow_mut().extend(args);
    Ok(target)
}

/// `map(array, callback)` calls `callback(element, index)` for each element.
fn native_map(interpreter: &mut Interpreter<'_>, env: &Env, pos: Position) -> EvalResult {
    let args = arguments(env);
    check_arity!(args, 2, pos, "map");
    let elements = expect_array(&args[0], "map", pos)?.borrow().clone();
    let callback = expect_function(&args[1], "map", pos)?;
    let mut mapped = Vec::with_capacity(elements.len());
    for (i, element) in elements.into_iter().enumerate() {
        mapped.push(interpreter.call_function(&callback, vec![element, Value::number(i as f64)], pos)?);
    }
    Ok(Value::array(mapped))
}

/// `filter(array, callback)` keeps the elements the callback finds truthy.
fn native_filter(interpreter: &mut Interpreter<'_>, env: &Env, pos: Position) -> EvalResult {
    let args = arguments(env);
    check_arity!(args, 2, pos, "filter");
    let elements = expect_array(&args[0], "filter", pos)?.borrow().clone();
    let callback = expect_function(&args[1], "filter", pos)?;
    let mut kept = Vec::new();
    for (i, element) in elements.into_iter().enumerate() {
        let keep = interpreter
            .call_function(&callback, vec![element.clone(), Value::number(i as f64)], pos)?
            .is_truthy();
        if keep {
            kept.push(element);
        }
    }
    Ok(Value::array(kept))
}

fn native_typeof(_: &mut Interpreter<'_>, env: &Env, pos: Position) -> EvalResult {
    let args = arguments(env);
    check_arity!(args, min 1, pos, "typeof");
    Ok(Value::string(args[0].type_name()))
}

#[cfg(test)]
mod tests {
    use crate::environment::Environment;
    use crate::evaluator::Interpreter;
    use crate::parser::parse_str;

    fn run(input: &str) -> Result<String, String> {
        let program = parse_str(input).map_err(|e| e.to_string())?;
        let env = Environment::new_global_populated();
        let mut output = Vec::new();
        Interpreter::new(&mut output)
            .run(&program, &env)
            .map_err(|e| e.to_string())?;
        Ok(String::from_utf8_lossy(&output).into_owned())
    }

    fn assert_output(input: &str, expected: &str) {
        match run(input) {
            Ok(output) => assert_eq!(output, expected, "Input: '{}'", input),
            Err(e) => panic!("Run failed for input '{}': {}", input, e),
        }
    }

    #[test]
    fn test_echo_formats_values() {
        assert_output("echo(1, 'two', #f, null)", "1 two #f null\n");
        assert_output("echo({a: 'x', ['k']: [1]})", "{a: \"x\", \"k\": [1]}\n");
        assert_output("func f(a) {}\n echo(f, echo)", "func f(a) {...} func echo() { [native code] }\n");
    }

    #[test]
    fn test_len() {
        assert_output("echo(len([1, 2, 3]), len('héllo'), len({a: 1}))", "3 5 1\n");
        assert_eq!(
            run("len(1)").unwrap_err(),
            "len() expects an array, string or object, got number. [1,4]"
        );
        assert_eq!(
            run("len()").unwrap_err(),
            "len() expects exactly 1 argument(s), got 0. [1,4]"
        );
    }

    #[test]
    fn test_push_mutates_in_place() {
        assert_output("var a = [1]\n var b = push(a, 2, 3)\n echo(a, a == b)", "[1, 2, 3] #t\n");
        assert!(run("push('x', 1)").unwrap_err().starts_with("push() expects an array"));
    }

    #[test]
    fn test_map_and_filter_call_back() {
        assert_output(
            "echo(map([1, 2, 3], func(x) { return x * 2 }))",
            "[2, 4, 6]\n",
        );
        assert_output(
            "echo(filter([1, 2, 3, 4], func(x) { return x % 2 == 0 }))",
            "[2, 4]\n",
        );
        assert_output(
            "echo(map(['a', 'b'], func(x, i) { return x + i }))",
            "[\"a0\", \"b1\"]\n",
        );
        assert!(run("map([1], 2)").unwrap_err().starts_with("map() expects a function"));
    }

    #[test]
    fn test_map_errors_propagate() {
        assert_eq!(
            run("map([1], func(x) { return x / 0 })").unwrap_err(),
            "cannot divide by zero. [1,29]"
        );
    }

    #[test]
    fn test_typeof() {
        assert_output(
            "echo(typeof(1), typeof(''), typeof(#t), typeof(null), typeof(undefined), typeof([]), typeof({}), typeof(echo))",
            "number string boolean null undefined array object function\n",
        );
    }

    #[test]
    fn test_variadic_arguments_visible_to_natives() {
        assert_output("echo(1)\n echo(1, 2, 3)\n echo(4)", "1\n1 2 3\n4\n");
    }
}
