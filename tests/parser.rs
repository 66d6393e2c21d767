#[cfg(test)]
mod parser_tests {
    use rslox as lox;

    use lox::ast_printer::AstPrinter;
    use lox::parser::Parser;
    use lox::scanner::Scanner;
    use lox::token::Token;

    /// Runs the scanner and parser, returning the printed statements and
    /// the rendered parse errors.
    fn parse_to_strings(source: &str) -> (Vec<String>, Vec<String>) {
        let tokens: Vec<Token> = Scanner::new(source.as_bytes())
            .filter_map(Result::ok)
            .collect();

        let (statements, errors) = Parser::new(&tokens).parse();

        let printed: Vec<String> = statements.iter().map(AstPrinter::print_stmt).collect();
        let rendered: Vec<String> = errors.iter().map(|e| e.to_string()).collect();

        (printed, rendered)
    }

    fn assert_parses_to(source: &str, expected: &[&str]) {
        let (printed, errors) = parse_to_strings(source);

        assert!(errors.is_empty(), "unexpected parse errors: {:?}", errors);
        assert_eq!(printed, expected);
    }

    #[test]
    fn test_parser_01_arithmetic_precedence() {
        assert_parses_to("print 1 + 2 * 3;", &["(print (+ 1.0 (* 2.0 3.0)))"]);
    }

    #[test]
    fn test_parser_02_unary_binds_tighter_than_binary() {
        assert_parses_to("print -1 - -2;", &["(print (- (- 1.0) (- 2.0)))"]);
    }

    #[test]
    fn test_parser_03_comparison_below_equality() {
        assert_parses_to("print 1 < 2 == true;", &["(print (== (< 1.0 2.0) true))"]);
    }

    #[test]
    fn test_parser_04_grouping() {
        assert_parses_to("print (1 + 2) / 3;", &["(print (/ (group (+ 1.0 2.0)) 3.0))"]);
    }

    #[test]
    fn test_parser_05_ternary_is_right_associative() {
        assert_parses_to(
            "print a ? b : c ? d : e;",
            &["(print (?: a b (?: c d e)))"],
        );
    }

    #[test]
    fn test_parser_06_ternary_binds_below_assignment() {
        assert_parses_to("x = a ? 1 : 2;", &["(expr (= x (?: a 1.0 2.0)))"]);
    }

    #[test]
    fn test_parser_07_logical_operators() {
        assert_parses_to("print a or b and c;", &["(print (or a (and b c)))"]);
    }

    #[test]
    fn test_parser_08_for_desugars_to_while() {
        assert_parses_to(
            "for (var i = 0; i < 3; i = i + 1) print i;",
            &["(block (var i = 0.0) (while (< i 3.0) (block (print i) (expr (= i (+ i 1.0))))))"],
        );
    }

    #[test]
    fn test_parser_09_for_without_clauses() {
        // No condition means an implicit `true`, and no initializer means
        // no wrapping block.
        assert_parses_to("for (;;) break;", &["(while true (break))"]);
    }

    #[test]
    fn test_parser_10_break_inside_while() {
        assert_parses_to(
            "while (true) { break; }",
            &["(while true (block (break)))"],
        );
    }

    #[test]
    fn test_parser_11_function_declaration() {
        assert_parses_to(
            "fun add(a, b) { return a + b; }",
            &["(fun add (a b) (return (+ a b)))"],
        );
    }

    #[test]
    fn test_parser_12_lambda_in_var_initializer() {
        assert_parses_to(
            "var f = fun (x) { return x; };",
            &["(var f = (lambda (x) (return x)))"],
        );
    }

    #[test]
    fn test_parser_13_bare_lambda_is_an_expression_statement() {
        // `fun` not followed by a name parses as an anonymous function, so
        // the statement path falls through to an expression statement.
        assert_parses_to("fun (x) {};", &["(expr (lambda (x)))"]);
    }

    #[test]
    fn test_parser_14_class_with_superclass_and_methods() {
        assert_parses_to(
            "class A < B { init(x) { this.x = x; } m() { return super.m; } }",
            &["(class A < B (fun init (x) (expr (= (. this x) x))) (fun m (return (super m))))"],
        );
    }

    #[test]
    fn test_parser_15_call_property_chain() {
        assert_parses_to(
            "a.b(1).c = 2;",
            &["(expr (= (. (call (. a b) 1.0) c) 2.0))"],
        );
    }

    #[test]
    fn test_parser_16_uninitialized_var() {
        assert_parses_to("var x;", &["(var x)"]);
    }

    #[test]
    fn test_break_outside_loop_is_reported_but_parsed() {
        let (printed, errors) = parse_to_strings("break;");

        assert_eq!(printed, &["(break)"]);
        assert_eq!(
            errors,
            &["[line 1] Error at 'break': Cannot use 'break' outside of a loop"]
        );
    }

    #[test]
    fn test_break_inside_function_inside_loop_is_reported() {
        // The function body resets the loop context, so the break is not
        // inside a loop even though the declaration is.
        let (_, errors) = parse_to_strings("while (true) { fun f() { break; } }");

        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("Cannot use 'break' outside of a loop"));
    }

    #[test]
    fn test_invalid_assignment_target_is_reported() {
        let (printed, errors) = parse_to_strings("1 = 2;");

        assert_eq!(printed, &["(expr 1.0)"]);
        assert_eq!(errors, &["[line 1] Error at '=': Invalid assignment target"]);
    }

    #[test]
    fn test_parameter_limit_is_reported() {
        let params: Vec<String> = (0..33).map(|i| format!("p{}", i)).collect();
        let source = format!("fun f({}) {{}}", params.join(", "));

        let (_, errors) = parse_to_strings(&source);

        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("Cannot have more than 32 parameters"));
    }

    #[test]
    fn test_argument_limit_is_reported() {
        let args: Vec<String> = (0..33).map(|i| i.to_string()).collect();
        let source = format!("f({});", args.join(", "));

        let (_, errors) = parse_to_strings(&source);

        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("Cannot have more than 32 arguments"));
    }

    #[test]
    fn test_exactly_32_parameters_is_accepted() {
        let params: Vec<String> = (0..32).map(|i| format!("p{}", i)).collect();
        let source = format!("fun f({}) {{}}", params.join(", "));

        let (printed, errors) = parse_to_strings(&source);

        assert!(errors.is_empty(), "unexpected parse errors: {:?}", errors);
        assert_eq!(printed.len(), 1);
    }

    #[test]
    fn test_parser_recovers_after_bad_declaration() {
        let (printed, errors) = parse_to_strings("var = 3;\nprint 7;");

        assert_eq!(printed, &["(print 7.0)"]);
        assert_eq!(errors, &["[line 1] Error at '=': Expected variable name"]);
    }

    #[test]
    fn test_missing_semicolon_at_end_of_input() {
        let (_, errors) = parse_to_strings("print 1");

        assert_eq!(errors, &["[line 1] Error at end: Expected ';' after value"]);
    }

    #[test]
    fn test_missing_colon_in_ternary() {
        let (_, errors) = parse_to_strings("print a ? b;");

        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("Expected ':' after then branch of conditional expression"));
    }

    #[test]
    fn test_multiple_errors_accumulate() {
        let (_, errors) = parse_to_strings("var = 1;\nvar = 2;\nprint 3;");

        assert_eq!(errors.len(), 2);
    }
}
