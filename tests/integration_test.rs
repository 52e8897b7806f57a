// Integration tests for the Python interpreter

use pretty_assertions::assert_eq;
use pytrace::interpreter::{Console, Interpreter, Unwind};
use pytrace::parser::parse::Parser;
use std::rc::Rc;

/// Run `source` with captured stdout
fn run(source: &str) -> (Result<(), Unwind>, String) {
    let mut parser = Parser::new(source).expect("Parser creation failed");
    let program = parser.parse_program().expect("Parsing failed");

    let console = Console::new();
    let _capture = console.redirect(Rc::from("test-host"), "read_input");
    let mut interpreter = Interpreter::new(console.clone());
    let result = interpreter.run(&program, source);
    (result, console.captured())
}

fn output(source: &str) -> String {
    let (result, stdout) = run(source);
    assert!(result.is_ok(), "Execution failed: {:?}", result);
    stdout
}

#[test]
fn test_simple_arithmetic() {
    let source = "x = 5\ny = 10\nz = x + y * 2\nprint(z, z // 4, z % 4, z / 2)\n";
    assert_eq!(output(source), "25 6 1 12.5\n");
}

#[test]
fn test_function_call() {
    let source = r#"
def add(a, b=4):
    return a + b

print(add(3), add(3, b=10))
"#;
    assert_eq!(output(source), "7 13\n");
}

#[test]
fn test_recursion() {
    let source = r#"
def fact(n):
    if n <= 1:
        return 1
    return n * fact(n - 1)

print(fact(10))
"#;
    assert_eq!(output(source), "3628800\n");
}

#[test]
fn test_class_basics() {
    let source = r#"
class Point:
    def __init__(self, x, y):
        self.x = x
        self.y = y

    def norm2(self):
        return self.x * self.x + self.y * self.y

p = Point(3, 4)
print(p.norm2(), p.x)
"#;
    assert_eq!(output(source), "25 3\n");
}

#[test]
fn test_containers_and_aliasing() {
    let source = r#"
xs = [3, 1, 2]
ys = xs
ys.append(0)
d = {"a": xs}
print(sorted(xs), len(d["a"]), xs is ys)
"#;
    assert_eq!(output(source), "[0, 1, 2, 3] 4 True\n");
}

#[test]
fn test_comprehensions_and_fstrings() {
    let source = r#"
squares = [n * n for n in range(5) if n % 2 == 0]
name = "py"
print(f"{name}: {squares}")
"#;
    assert_eq!(output(source), "py: [0, 4, 16]\n");
}

#[test]
fn test_exception_handling() {
    let source = r#"
try:
    1 / 0
except ZeroDivisionError as e:
    print("caught", e)
finally:
    print("done")
"#;
    assert_eq!(output(source), "caught division by zero\ndone\n");
}

#[test]
fn test_uncaught_exception_traceback() {
    let source = "def f():\n    return [][1]\n\nf()\n";
    let (result, _) = run(source);
    let Err(Unwind::Error(exception)) = result else {
        panic!("expected an exception, got {:?}", result);
    };
    assert_eq!(exception.innermost_origin(), Some("<string>"));
    let lines: Vec<usize> = exception
        .traceback
        .iter()
        .filter(|entry| entry.origin.as_ref() == "<string>")
        .map(|entry| entry.line)
        .collect();
    assert_eq!(lines, vec![2, 4]);
}

#[test]
fn test_input_without_hook_is_eof() {
    let (result, stdout) = run("x = input('? ')\n");
    assert!(matches!(result, Err(Unwind::Error(_))));
    assert_eq!(stdout, "");
}

#[test]
fn test_scripted_input_is_consumed_in_order() {
    let source = "a = input('a? ')\nb = input('b? ')\nprint(int(a) + int(b))\n";
    let program = Parser::new(source).unwrap().parse_program().unwrap();
    let console = Console::scripted(vec!["2".to_string(), "40".to_string()]);
    let mut interpreter = Interpreter::new(console);
    assert!(interpreter.run(&program, source).is_ok());
    let globals = interpreter.globals();
    let a = globals.iter().find(|(name, _)| name == "a").map(|(_, v)| v.clone());
    assert_eq!(a.and_then(|v| v.as_str().map(str::to_string)).as_deref(), Some("2"));
}

#[test]
fn test_modular_pow_with_negative_exponent() {
    let source = "print(pow(2, -1, 5), pow(3, -2, 7), pow(5, 3, 13))\n";
    assert_eq!(output(source), "3 4 8\n");
    let (result, _) = run("pow(4, -1, 8)\n");
    assert!(matches!(result, Err(Unwind::Error(_))));
}
