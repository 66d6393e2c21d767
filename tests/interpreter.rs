#[cfg(test)]
mod interpreter_tests {
    use rslox as lox;

    use lox::error::LoxError;
    use lox::interpreter::Interpreter;
    use lox::parser::Parser;
    use lox::resolver::Resolver;
    use lox::scanner::Scanner;
    use lox::token::Token;

    /// Runs `source` through the whole pipeline, capturing program output.
    /// Static errors fail the test; the runtime result is handed back.
    fn run_source(source: &str) -> (String, Result<(), LoxError>) {
        let tokens: Vec<Token> = Scanner::new(source.as_bytes())
            .filter_map(Result::ok)
            .collect();

        let (statements, parse_errors) = Parser::new(&tokens).parse();
        assert!(
            parse_errors.is_empty(),
            "unexpected parse errors: {:?}",
            parse_errors
        );

        let (locals, resolve_errors) = Resolver::new().resolve(&statements);
        assert!(
            resolve_errors.is_empty(),
            "unexpected resolve errors: {:?}",
            resolve_errors
        );

        let mut buffer: Vec<u8> = Vec::new();

        let result = {
            let mut interpreter = Interpreter::with_output(&mut buffer);
            interpreter.run(&statements, locals)
        };

        (String::from_utf8(buffer).expect("output is UTF-8"), result)
    }

    fn assert_output(source: &str, expected: &str) {
        let (output, result) = run_source(source);

        assert!(result.is_ok(), "unexpected runtime error: {:?}", result);
        assert_eq!(output, expected);
    }

    fn assert_runtime_error(source: &str, expected: &str) {
        let (_, result) = run_source(source);

        match result {
            Err(e) => {
                assert!(!e.is_static());
                assert_eq!(e.to_string(), expected);
            }
            Ok(()) => panic!("expected runtime error '{}', but program succeeded", expected),
        }
    }

    // ───────────────────────── expressions ────────────────────────

    #[test]
    fn test_arithmetic_and_number_formatting() {
        assert_output("print 1 + 2;", "3\n");
        assert_output("print 10 / 4;", "2.5\n");
        assert_output("print 4 / 2;", "2\n");
        assert_output("print 0.5 + 0.25;", "0.75\n");
        assert_output("print -3;", "-3\n");
    }

    #[test]
    fn test_string_concatenation() {
        assert_output("print \"foo\" + \"bar\";", "foobar\n");
    }

    #[test]
    fn test_literals_print_themselves() {
        assert_output("print true;", "true\n");
        assert_output("print false;", "false\n");
        assert_output("print nil;", "nil\n");
        assert_output("print \"hi\";", "hi\n");
    }

    #[test]
    fn test_equality_is_strict() {
        assert_output("print 1 == \"1\";", "false\n");
        assert_output("print nil == nil;", "true\n");
        assert_output("print \"a\" == \"a\";", "true\n");
        assert_output("print 1 != 2;", "true\n");
        assert_output("print nil == false;", "false\n");
    }

    #[test]
    fn test_logical_operators_return_the_deciding_operand() {
        assert_output("print \"hi\" or 2;", "hi\n");
        assert_output("print nil or \"yes\";", "yes\n");
        assert_output("print nil and 2;", "nil\n");
        assert_output("print 1 and 2;", "2\n");
    }

    #[test]
    fn test_ternary_selects_branch() {
        assert_output("print true ? 1 : 2;", "1\n");
        assert_output("print false ? 1 : 2;", "2\n");
    }

    #[test]
    fn test_ternary_untaken_branch_is_not_evaluated() {
        // The division would be a runtime error if it ran.
        assert_output("print true ? 1 : 1 / 0;", "1\n");

        assert_output(
            "fun loud() { print \"evaluated\"; return 1; } print false ? loud() : 9;",
            "9\n",
        );
    }

    #[test]
    fn test_unary_operators() {
        assert_output("print !true;", "false\n");
        assert_output("print !nil;", "true\n");
        assert_output("print !0;", "false\n");
        assert_output("print --3;", "3\n");
    }

    // ───────────────────────── variables and scope ─────────────────

    #[test]
    fn test_assignment_is_an_expression() {
        assert_output("var a = 1; print a = 2; print a;", "2\n2\n");
    }

    #[test]
    fn test_block_scoping_and_shadowing() {
        assert_output(
            r#"
            var a = "global a";
            var b = "global b";
            {
                var a = "outer a";
                {
                    var a = "inner a";
                    print a;
                    print b;
                }
                print a;
            }
            print a;
            "#,
            "inner a\nglobal b\nouter a\nglobal a\n",
        );
    }

    #[test]
    fn test_global_redefinition_is_allowed() {
        assert_output("var a = 1; var a = 2; print a;", "2\n");
    }

    #[test]
    fn test_uninitialized_variable_read_is_an_error() {
        assert_runtime_error(
            "var a; print a;",
            "[line 1] Runtime error: Attempted to use uninitialized variable 'a'",
        );
    }

    #[test]
    fn test_assignment_cures_uninitialized() {
        assert_output("var a; a = 1; print a;", "1\n");
    }

    #[test]
    fn test_nil_initializer_is_not_uninitialized() {
        assert_output("var a = nil; print a;", "nil\n");
    }

    #[test]
    fn test_undefined_variable_read() {
        assert_runtime_error("print x;", "[line 1] Runtime error: Undefined variable 'x'");
    }

    #[test]
    fn test_undefined_variable_assignment() {
        assert_runtime_error("x = 1;", "[line 1] Runtime error: Undefined variable 'x'");
    }

    #[test]
    fn test_runtime_error_stops_the_program() {
        let (output, result) = run_source("print 1; print x; print 2;");

        assert!(result.is_err());
        assert_eq!(output, "1\n");
    }

    // ───────────────────────── control flow ────────────────────────

    #[test]
    fn test_if_else() {
        assert_output("if (1 < 2) print \"then\"; else print \"else\";", "then\n");
        assert_output("if (1 > 2) print \"then\"; else print \"else\";", "else\n");
    }

    #[test]
    fn test_while_loop() {
        assert_output(
            "var i = 0; while (i < 3) { print i; i = i + 1; }",
            "0\n1\n2\n",
        );
    }

    #[test]
    fn test_for_loop() {
        assert_output("for (var i = 0; i < 3; i = i + 1) print i;", "0\n1\n2\n");
    }

    #[test]
    fn test_break_leaves_the_loop() {
        assert_output(
            "var i = 0; while (true) { i = i + 1; if (i == 3) break; } print i;",
            "3\n",
        );
    }

    #[test]
    fn test_break_only_leaves_the_innermost_loop() {
        assert_output(
            r#"
            for (var i = 0; i < 2; i = i + 1) {
                for (var j = 0; j < 10; j = j + 1) {
                    if (j == 1) break;
                    print i + j;
                }
            }
            "#,
            "0\n1\n",
        );
    }

    #[test]
    fn test_break_restores_enclosing_scope() {
        assert_output(
            "var a = 1; while (true) { var a = 2; print a; break; } print a;",
            "2\n1\n",
        );
    }

    // ───────────────────────── functions ───────────────────────────

    #[test]
    fn test_function_call_and_return() {
        assert_output("fun add(a, b) { return a + b; } print add(1, 2);", "3\n");
    }

    #[test]
    fn test_function_without_return_yields_nil() {
        assert_output("fun f() {} print f();", "nil\n");
    }

    #[test]
    fn test_return_unwinds_nested_blocks_and_loops() {
        assert_output(
            r#"
            fun find() {
                for (var i = 0; i < 10; i = i + 1) {
                    if (i == 3) return i;
                }
                return -1;
            }
            print find();
            "#,
            "3\n",
        );
    }

    #[test]
    fn test_recursion() {
        assert_output(
            "fun fib(n) { if (n <= 1) return n; return fib(n - 1) + fib(n - 2); } print fib(10);",
            "55\n",
        );
    }

    #[test]
    fn test_closure_keeps_its_counter() {
        assert_output(
            r#"
            fun makeCounter() {
                var count = 0;
                fun increment() {
                    count = count + 1;
                    return count;
                }
                return increment;
            }
            var counter = makeCounter();
            print counter();
            print counter();
            "#,
            "1\n2\n",
        );
    }

    #[test]
    fn test_closure_binds_lexically_not_dynamically() {
        assert_output(
            r#"
            var a = "global";
            {
                fun showA() {
                    print a;
                }
                showA();
                var a = "block";
                showA();
            }
            "#,
            "global\nglobal\n",
        );
    }

    #[test]
    fn test_lambda_values() {
        assert_output(
            "var square = fun (x) { return x * x; }; print square(4);",
            "16\n",
        );

        assert_output(
            "fun twice(f, x) { return f(f(x)); } print twice(fun (n) { return n + 1; }, 5);",
            "7\n",
        );
    }

    #[test]
    fn test_callable_display_forms() {
        assert_output("fun f() {} print f;", "<fn f>\n");
        assert_output("print fun (x) { return x; };", "<anonymous>\n");
        assert_output("print clock;", "<native fn clock>\n");
    }

    #[test]
    fn test_clock_returns_a_number() {
        assert_output("print clock() > 0;", "true\n");
    }

    #[test]
    fn test_arity_is_checked_exactly() {
        assert_runtime_error(
            "fun f(a) {} f(1, 2);",
            "[line 1] Runtime error: Expected 1 arguments but got 2",
        );
        assert_runtime_error(
            "fun f(a, b) {} f(1);",
            "[line 1] Runtime error: Expected 2 arguments but got 1",
        );
    }

    #[test]
    fn test_only_functions_and_classes_are_callable() {
        assert_runtime_error(
            "var x = 1; x();",
            "[line 1] Runtime error: Can only call functions and classes",
        );
        assert_runtime_error(
            "\"text\"();",
            "[line 1] Runtime error: Can only call functions and classes",
        );
    }

    // ───────────────────────── classes ─────────────────────────────

    #[test]
    fn test_class_and_instance_display() {
        assert_output("class Bagel {} print Bagel;", "Bagel\n");
        assert_output("class Bagel {} print Bagel();", "Bagel instance\n");
    }

    #[test]
    fn test_fields_get_and_set() {
        assert_output(
            "class Bagel {} var b = Bagel(); b.flavor = \"plain\"; print b.flavor;",
            "plain\n",
        );
    }

    #[test]
    fn test_set_is_an_expression() {
        assert_output(
            "class A {} var a = A(); print a.x = 5; print a.x;",
            "5\n5\n",
        );
    }

    #[test]
    fn test_methods_and_this() {
        assert_output(
            r#"
            class Cake {
                taste() {
                    var adjective = "delicious";
                    print "The " + this.flavor + " cake is " + adjective + "!";
                }
            }
            var cake = Cake();
            cake.flavor = "German chocolate";
            cake.taste();
            "#,
            "The German chocolate cake is delicious!\n",
        );
    }

    #[test]
    fn test_bound_method_remembers_its_instance() {
        assert_output(
            r#"
            class A {
                m() {
                    return this.name;
                }
            }
            var a = A();
            a.name = "bound";
            var f = a.m;
            print f();
            "#,
            "bound\n",
        );
    }

    #[test]
    fn test_initializer_sets_up_fields() {
        assert_output(
            r#"
            class Point {
                init(x, y) {
                    this.x = x;
                    this.y = y;
                }
            }
            var p = Point(3, 4);
            print p.x + p.y;
            "#,
            "7\n",
        );
    }

    #[test]
    fn test_calling_init_directly_returns_the_instance() {
        assert_output(
            r#"
            class Foo {
                init() {
                    print "init ran";
                }
            }
            var foo = Foo();
            print foo.init();
            "#,
            "init ran\ninit ran\nFoo instance\n",
        );
    }

    #[test]
    fn test_bare_return_in_initializer_still_yields_instance() {
        assert_output(
            r#"
            class A {
                init(flag) {
                    if (flag) return;
                    this.x = 1;
                }
            }
            print A(true);
            "#,
            "A instance\n",
        );
    }

    #[test]
    fn test_undefined_property() {
        assert_runtime_error(
            "class A {} print A().m;",
            "[line 1] Runtime error: Undefined property 'm'",
        );
    }

    #[test]
    fn test_properties_require_an_instance() {
        assert_runtime_error(
            "print 4.x;",
            "[line 1] Runtime error: Only instances have properties",
        );
        assert_runtime_error(
            "4.x = 1;",
            "[line 1] Runtime error: Only instances have fields",
        );
    }

    // ───────────────────────── inheritance ─────────────────────────

    #[test]
    fn test_inherited_methods() {
        assert_output(
            "class A { m() { return \"A\"; } } class B < A {} print B().m();",
            "A\n",
        );
    }

    #[test]
    fn test_overridden_methods() {
        assert_output(
            r#"
            class A { m() { return "A"; } }
            class B < A { m() { return "B"; } }
            print B().m();
            "#,
            "B\n",
        );
    }

    #[test]
    fn test_inherited_initializer_and_arity() {
        assert_output(
            r#"
            class A {
                init(x) {
                    this.x = x;
                }
            }
            class B < A {}
            print B(5).x;
            "#,
            "5\n",
        );
    }

    #[test]
    fn test_super_calls_the_superclass_method() {
        assert_output(
            r#"
            class Doughnut {
                cook() {
                    print "Fry until golden brown.";
                }
            }
            class BostonCream < Doughnut {
                cook() {
                    super.cook();
                    print "Pipe full of custard and coat with chocolate.";
                }
            }
            BostonCream().cook();
            "#,
            "Fry until golden brown.\nPipe full of custard and coat with chocolate.\n",
        );
    }

    #[test]
    fn test_super_dispatches_from_the_declaring_class() {
        // `super` in B::test always starts above B, even when called on a C
        // instance.
        assert_output(
            r#"
            class A {
                method() {
                    print "A method";
                }
            }
            class B < A {
                method() {
                    print "B method";
                }
                test() {
                    super.method();
                }
            }
            class C < B {}
            C().test();
            "#,
            "A method\n",
        );
    }

    #[test]
    fn test_super_method_must_exist() {
        assert_runtime_error(
            "class A {} class B < A { m() { return super.missing; } } B().m();",
            "[line 1] Runtime error: Undefined property 'missing'",
        );
    }

    #[test]
    fn test_superclass_must_be_a_class() {
        assert_runtime_error(
            "var NotAClass = \"so not\"; class Sub < NotAClass {}",
            "[line 1] Runtime error: Superclass must be a class",
        );
    }

    // ───────────────────────── operand errors ──────────────────────

    #[test]
    fn test_unary_operand_must_be_a_number() {
        assert_runtime_error(
            "print -\"s\";",
            "[line 1] Runtime error: Operand must be a number",
        );
    }

    #[test]
    fn test_binary_operand_errors() {
        assert_runtime_error(
            "print 1 + true;",
            "[line 1] Runtime error: Operands must be two numbers or two strings",
        );
        assert_runtime_error(
            "print 1 < \"s\";",
            "[line 1] Runtime error: Operands must be numbers",
        );
        assert_runtime_error(
            "print \"a\" * 2;",
            "[line 1] Runtime error: Operands must be numbers",
        );
    }

    #[test]
    fn test_division_by_zero() {
        assert_runtime_error(
            "print 5 / 0;",
            "[line 1] Runtime error: Division by zero",
        );
        assert_output("print 0 / 5;", "0\n");
    }
}
