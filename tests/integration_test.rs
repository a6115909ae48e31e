use std::{cell::RefCell, io::Cursor, rc::Rc};

use linescript::{
    interpreter::{ErrorCategory, ExecutionErrorKind},
    value::Value,
    Interpreter, Limits, Program, Termination,
};
use pretty_assertions::assert_eq;

struct Run {
    output: String,
    termination: Termination,
    interpreter: Interpreter,
}

impl Run {
    fn categories(&self) -> Vec<ErrorCategory> {
        self.interpreter
            .diagnostics()
            .iter()
            .map(|error| error.kind.category())
            .collect()
    }
}

fn run_program(source: &str) -> Run {
    run_with(source, "", Limits::default())
}

fn run_with(source: &str, input: &str, limits: Limits) -> Run {
    let output = Rc::new(RefCell::new(Vec::new()));
    let stdin = Rc::new(RefCell::new(Cursor::new(input.as_bytes().to_vec())));
    let mut interpreter = Interpreter::new(output.clone())
        .with_input(stdin)
        .with_limits(limits);
    let termination = interpreter
        .run(&Program::from_source(source))
        .expect("Writing to a Vec should not fail");
    let output = String::from_utf8(output.take()).expect("Output should be valid UTF-8");
    Run {
        output,
        termination,
        interpreter,
    }
}

fn test_valid_program(source: &str, expected_output: &str) {
    let run = run_program(source);
    assert_eq!(run.output, expected_output);
    assert!(
        run.interpreter.diagnostics().is_empty(),
        "unexpected errors: {:?}",
        run.interpreter.diagnostics()
    );
}

#[test]
fn test_arithmetic_and_print() {
    let source = r#"
    int a = 3 + 4
    print a
    float f = 1.5 * 2.0
    print f
    bool b = a > 6
    print b
    print hello   world
    "#;
    test_valid_program(source, "7\n3.000000\ntrue\nhello world\n");
}

#[test]
fn test_first_match_grouping() {
    let source = r#"
    int x = 2 * 3 + 4
    print x
    int y = ( 2 * 3 ) + 4
    print y
    "#;
    test_valid_program(source, "14\n10\n");
}

#[test]
fn test_division_by_zero_leaves_target_unchanged() {
    let source = r#"
    int x = 7
    x = 5 / 0
    print x
    float f = 1.5
    f = 5.0 / 0.0
    print f
    "#;
    let run = run_program(source);
    assert_eq!(
        run.output,
        "Error: Division by zero\n7\nError: Division by zero\n1.500000\n"
    );
    assert_eq!(
        run.categories(),
        vec![ErrorCategory::DivisionByZero, ErrorCategory::DivisionByZero]
    );
}

#[test]
fn test_int_widens_into_float_only() {
    let source = r#"
    int x = 5
    float y = x
    print y
    string s = x
    "#;
    let run = run_program(source);
    assert_eq!(
        run.output,
        "5.000000\nError: Type mismatch: cannot store int in string variable 's'\n"
    );
    assert_eq!(run.categories(), vec![ErrorCategory::TypeMismatch]);
    assert_eq!(
        run.interpreter.variable("y").unwrap().value(),
        &Value::Float(5.0)
    );
}

#[test]
fn test_redeclaration_reuses_variable() {
    let source = r#"
    int x = 1
    int x = 2
    print x
    float x = 3.0
    print x
    "#;
    let run = run_program(source);
    assert_eq!(
        run.output,
        "2\nError: Type mismatch: 'x' is already declared as int, not float\n2\n"
    );
}

#[test]
fn test_function_scope_shadows_and_restores() {
    let source = r#"
    int x = 1
    show()
    print x
    function show {
        int x = 2
        print x
        return
    }
    "#;
    let run = run_program(source);
    assert_eq!(run.output, "2\n1\n");
    assert_eq!(run.termination, Termination::EndOfProgram);
    assert_eq!(run.interpreter.current_scope(), 0);
    assert_eq!(run.interpreter.call_depth(), 0);

    let functions = run.interpreter.jump_table().functions();
    assert_eq!(functions.len(), 1);
    let (name, span) = functions[0];
    assert_eq!(name, "show");
    assert_eq!((span.start, span.end), (4, 8));
}

#[test]
fn test_callee_variables_are_purged_on_return() {
    let source = r#"
    make ()
    print y
    make()
    print y
    function make() {
        int y = 7
        print y
        return
    }
    "#;
    test_valid_program(source, "7\ny\n7\ny\n");
}

#[test]
fn test_function_sees_caller_variables() {
    let source = r#"
    int total = 1
    bump()
    bump()
    print total
    function bump {
        total = total + 10
        return
    }
    "#;
    test_valid_program(source, "21\n");
}

#[test]
fn test_if_false_bypasses_elseif_and_else() {
    // A false `if` jumps straight to its endif, so neither the true elseif
    // nor the else branch runs.
    let source = r#"
    if false
        print a
    elseif true
        print b
    else
        print c
    endif
    print done
    "#;
    let run = run_program(source);
    assert_eq!(run.output, "done\n");
    assert_eq!(run.interpreter.control_depth(), 0);
    assert!(run.interpreter.diagnostics().is_empty());
}

#[test]
fn test_if_true_skips_remaining_branches() {
    let source = r#"
    int x = 5
    if x > 3
        print big
    elseif x > 1
        print medium
    else
        print small
    endif
    print done
    "#;
    test_valid_program(source, "big\ndone\n");
}

#[test]
fn test_nested_if() {
    let source = r#"
    if true
        if false
            print hidden
        endif
        print shown
    endif
    "#;
    let run = run_program(source);
    assert_eq!(run.output, "shown\n");
    assert_eq!(run.interpreter.control_depth(), 0);
}

#[test]
fn test_logic_in_conditions() {
    let source = r#"
    int a = 2
    if a > 1 && a < 3
        print in range
    endif
    if ! ( a == 2 ) || false
        print never
    endif
    "#;
    test_valid_program(source, "in range\n");
}

#[test]
fn test_non_boolean_condition() {
    let source = r#"
    if 1 + 1
        print inside
    endif
    "#;
    let run = run_program(source);
    assert!(matches!(
        run.interpreter.diagnostics()[0].kind,
        ExecutionErrorKind::NonBooleanCondition(_)
    ));
}

#[test]
fn test_while_runs_body_five_times() {
    let source = r#"
    int i = 0
    int runs = 0
    while i < 5
        runs = runs + 1
        i = i + 1
    endwhile
    print runs
    "#;
    test_valid_program(source, "5\n");
}

#[test]
fn test_while_false_skips_body() {
    let source = r#"
    while false
        print never
    endwhile
    print after
    "#;
    test_valid_program(source, "after\n");
}

#[test]
fn test_for_loop() {
    let source = r#"
    for ( int i = 0 ; i < 3 ; i = i + 1 )
        print i
    endfor
    "#;
    test_valid_program(source, "0\n1\n2\n");
}

#[test]
fn test_for_loop_iteration_cap() {
    // The body runs once before the first check, then loops back at most
    // 1000 times.
    let source = r#"
    int runs = 0
    for ( int i = 0 ; i < 2000 ; i = i + 1 )
        runs = runs + 1
    endfor
    print runs
    print i
    "#;
    test_valid_program(source, "1001\n1001\n");
}

#[test]
fn test_for_loop_iteration_cap_is_configurable() {
    let source = r#"
    int runs = 0
    for ( int i = 0 ; i < 100 ; i = i + 1 )
        runs = runs + 1
    endfor
    print runs
    "#;
    let limits = Limits {
        max_for_iterations: 2,
        ..Limits::default()
    };
    let run = run_with(source, "", limits);
    assert_eq!(run.output, "3\n");
    assert_eq!(run.interpreter.limits().max_for_iterations, 2);
}

#[test]
fn test_nested_loops() {
    let source = r#"
    int total = 0
    for ( int i = 0 ; i < 3 ; i = i + 1 )
        int j = 0
        while j < 2
            total = total + 1
            j = j + 1
        endwhile
    endfor
    print total
    "#;
    test_valid_program(source, "6\n");
}

#[test]
fn test_for_clause_cannot_transfer_control() {
    let source = r#"
    for ( goto top ; true ; )
        print body
    endfor
    "#;
    let run = run_program(source);
    assert!(run
        .output
        .starts_with("Error: for clause cannot transfer control: goto top\nbody\n"));
    assert!(matches!(
        run.interpreter.diagnostics()[0].kind,
        ExecutionErrorKind::ForClauseTransfersControl(_)
    ));
}

#[test]
fn test_for_clause_may_be_a_no_op() {
    let source = r#"
    int i = 0
    for ( x ; i < 3 ; i = i + 1 )
        print i
    endfor
    print done
    "#;
    test_valid_program(source, "0\n1\n2\ndone\n");
}

#[test]
fn test_endfor_with_non_boolean_condition_leaves_loop() {
    let source = r#"
    int i = 0
    for ( ; i ; )
        print body
    endfor
    print after
    "#;
    let run = run_program(source);
    assert_eq!(
        run.output,
        "body\nError: Condition must be boolean, found int\nafter\n"
    );
    assert_eq!(run.categories(), vec![ErrorCategory::TypeMismatch]);
    assert_eq!(run.interpreter.control_depth(), 0);
}

#[test]
fn test_endwhile_with_failing_condition_leaves_loop() {
    let source = r#"
    int n = 5
    while 10 / n > 1
        n = 0
    endwhile
    print after
    "#;
    let run = run_program(source);
    assert_eq!(run.output, "Error: Division by zero\nafter\n");
    assert_eq!(run.categories(), vec![ErrorCategory::DivisionByZero]);
    assert_eq!(run.interpreter.control_depth(), 0);
}

#[test]
fn test_goto_and_undefined_label() {
    let source = r#"
    goto skip
    print never
    skip:
    print reached
    goto nowhere
    print continued
    "#;
    let run = run_program(source);
    assert_eq!(
        run.output,
        "reached\nError: Label 'nowhere' not found\ncontinued\n"
    );
    assert_eq!(run.categories(), vec![ErrorCategory::UndefinedReference]);
    assert_eq!(run.interpreter.diagnostics()[0].line, 5);
}

#[test]
fn test_call_stack_overflow_is_recoverable() {
    let source = r#"
    recurse()
    print back
    function recurse {
        recurse()
        return
    }
    "#;
    let run = run_program(source);
    assert_eq!(run.output, "Error: Call stack overflow\nback\n");
    assert_eq!(run.categories(), vec![ErrorCategory::StackOverflow]);
    assert_eq!(run.interpreter.current_scope(), 0);
}

#[test]
fn test_control_stack_overflow_is_recoverable() {
    let source = r#"
    if true
        if true
            print inner
        endif
    endif
    "#;
    let limits = Limits {
        max_control_depth: 1,
        ..Limits::default()
    };
    let run = run_with(source, "", limits);
    assert!(run
        .output
        .starts_with("Error: Control stack overflow\ninner\n"));
    assert_eq!(run.categories()[0], ErrorCategory::StackOverflow);
}

#[test]
fn test_return_outside_function() {
    let source = r#"
    return
    print still running
    "#;
    let run = run_program(source);
    assert_eq!(
        run.output,
        "Error: return outside function\nstill running\n"
    );
}

#[test]
fn test_undefined_function() {
    let run = run_program("missing()\nprint ok");
    assert_eq!(run.output, "Error: Function 'missing' not defined\nok\n");
    assert_eq!(run.categories(), vec![ErrorCategory::UndefinedReference]);
}

#[test]
fn test_missing_terminator() {
    let run = run_program("while true\nprint x");
    assert_eq!(run.output, "Error: Missing endwhile for while\nx\n");
    assert_eq!(run.categories(), vec![ErrorCategory::MissingTerminator]);
}

#[test]
fn test_unclosed_function_is_reported_again_when_reached() {
    let run = run_program("print start\nfunction broken {\nprint inside");
    assert_eq!(
        run.output,
        "Error: Missing } for function\nstart\nError: Missing } for function\ninside\n"
    );
    assert_eq!(
        run.categories(),
        vec![ErrorCategory::MissingTerminator, ErrorCategory::MissingTerminator]
    );
    assert_eq!(run.interpreter.diagnostics()[1].line, 1);
}

#[test]
fn test_prescan_errors_are_reported() {
    let source = r#"
    a:
    a:
    print ok
    "#;
    let run = run_program(source);
    assert_eq!(run.output, "Error: Duplicate label: a\nok\n");
    assert_eq!(run.categories(), vec![ErrorCategory::DuplicateDeclaration]);
}

#[test]
fn test_input_conversion() {
    let source = r#"
    int age = 0
    bool ok = false
    string name = x
    input age
    input ok
    input name
    print age
    print ok
    print name
    "#;
    let run = run_with(source, "42\ntrue\nAda Lovelace\n", Limits::default());
    assert_eq!(
        run.output,
        "Enter value for age: Enter value for ok: Enter value for name: 42\ntrue\nAda Lovelace\n"
    );
}

#[test]
fn test_invalid_input_leaves_variable_unchanged() {
    let source = r#"
    bool ok = true
    input ok
    print ok
    input ok
    "#;
    let run = run_with(source, "maybe\n", Limits::default());
    assert_eq!(
        run.output,
        "Enter value for ok: Error: Invalid bool value for 'ok': maybe\ntrue\n\
         Enter value for ok: Error: Error reading input\n"
    );
    assert_eq!(run.categories(), vec![ErrorCategory::Input, ErrorCategory::Input]);
}

#[test]
fn test_exit() {
    let source = r#"
    print one
    exit 3
    print two
    "#;
    let run = run_program(source);
    assert_eq!(run.output, "one\nProgram ended with exit code '3'\n");
    assert_eq!(run.termination, Termination::Exit("3".to_string()));
}

#[test]
fn test_exit_without_code() {
    let run = run_program("print one\nexit\nprint two");
    assert_eq!(run.output, "one\nProgram ended with exit code '0'\n");
    assert_eq!(run.termination, Termination::Exit("0".to_string()));
    assert_eq!(run.interpreter.pc(), 1);
}

#[test]
fn test_comments_are_ignored() {
    let source = r#"
    # setup
    // more notes
    print ok
    "#;
    test_valid_program(source, "ok\n");
}

#[test]
fn test_interpreter_is_reusable() {
    let output = Rc::new(RefCell::new(Vec::new()));
    let mut interpreter = Interpreter::new(output.clone());
    interpreter
        .run(&Program::from_source("int x = 1\nprint x"))
        .unwrap();
    interpreter.run(&Program::from_source("print x")).unwrap();
    assert_eq!(String::from_utf8(output.take()).unwrap(), "1\nx\n");
}
