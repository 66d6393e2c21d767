#[cfg(test)]
mod resolver_tests {
    use rslox as lox;

    use lox::parser::Parser;
    use lox::resolver::Resolver;
    use lox::scanner::Scanner;
    use lox::token::Token;

    /// Parses `source` (which must be syntactically valid) and returns the
    /// rendered resolution errors.
    fn resolve_errors(source: &str) -> Vec<String> {
        let tokens: Vec<Token> = Scanner::new(source.as_bytes())
            .filter_map(Result::ok)
            .collect();

        let (statements, parse_errors) = Parser::new(&tokens).parse();
        assert!(
            parse_errors.is_empty(),
            "unexpected parse errors: {:?}",
            parse_errors
        );

        let (_, errors) = Resolver::new().resolve(&statements);

        errors.iter().map(|e| e.to_string()).collect()
    }

    /// Like [`resolve_errors`] but returns the sorted lexical distances of
    /// every resolved occurrence, asserting nothing failed.
    fn resolve_depths(source: &str) -> Vec<usize> {
        let tokens: Vec<Token> = Scanner::new(source.as_bytes())
            .filter_map(Result::ok)
            .collect();

        let (statements, parse_errors) = Parser::new(&tokens).parse();
        assert!(
            parse_errors.is_empty(),
            "unexpected parse errors: {:?}",
            parse_errors
        );

        let (locals, errors) = Resolver::new().resolve(&statements);
        assert!(errors.is_empty(), "unexpected resolve errors: {:?}", errors);

        let mut depths: Vec<usize> = locals.values().copied().collect();
        depths.sort_unstable();

        depths
    }

    #[test]
    fn test_read_in_own_initializer() {
        let errors = resolve_errors("{ var a = a; }");

        assert_eq!(
            errors,
            &["[line 1] Error at 'a': Cannot read local variable in its own initializer"]
        );
    }

    #[test]
    fn test_shadowing_an_outer_scope_is_fine() {
        let errors = resolve_errors("{ var a = 1; { var a = 2; print a; } print a; }");

        assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
    }

    #[test]
    fn test_initializer_reading_a_shadowed_outer_variable_still_errors() {
        // The inner declaration shadows before its initializer resolves,
        // so `var a = a;` never reaches the outer binding.
        let errors = resolve_errors("{ var a = 1; { var a = a; } print a; }");

        assert_eq!(
            errors,
            &["[line 1] Error at 'a': Cannot read local variable in its own initializer"]
        );
    }

    #[test]
    fn test_redeclaration_in_same_scope() {
        let errors = resolve_errors("{ var a = 1; var a = 2; print a; }");

        assert_eq!(
            errors,
            &["[line 1] Error at 'a': Variable already declared in this scope"]
        );
    }

    #[test]
    fn test_redeclaration_of_global_is_allowed() {
        let errors = resolve_errors("var a = 1; var a = 2; print a;");

        assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
    }

    #[test]
    fn test_top_level_return() {
        let errors = resolve_errors("return 1;");

        assert_eq!(
            errors,
            &["[line 1] Error at 'return': Cannot return from top-level code"]
        );
    }

    #[test]
    fn test_return_value_from_initializer() {
        let errors = resolve_errors("class A { init() { return 1; } }");

        assert_eq!(
            errors,
            &["[line 1] Error at 'return': Cannot return a value from an initializer"]
        );
    }

    #[test]
    fn test_bare_return_from_initializer_is_allowed() {
        let errors = resolve_errors("class A { init() { return; } }");

        assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
    }

    #[test]
    fn test_this_outside_class() {
        let errors = resolve_errors("print this;");

        assert_eq!(
            errors,
            &["[line 1] Error at 'this': Cannot use 'this' outside of a class"]
        );
    }

    #[test]
    fn test_this_inside_method_is_allowed() {
        let errors = resolve_errors("class A { m() { return this; } }");

        assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
    }

    #[test]
    fn test_super_outside_class() {
        let errors = resolve_errors("super.m;");

        assert_eq!(
            errors,
            &["[line 1] Error at 'super': Cannot use 'super' outside of a class"]
        );
    }

    #[test]
    fn test_super_without_superclass() {
        let errors = resolve_errors("class A { m() { return super.m; } }");

        assert_eq!(
            errors,
            &["[line 1] Error at 'super': Cannot use 'super' in a class with no superclass"]
        );
    }

    #[test]
    fn test_super_with_superclass_is_allowed() {
        let errors = resolve_errors("class A {} class B < A { m() { return super.m; } }");

        assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
    }

    #[test]
    fn test_class_inheriting_from_itself() {
        let errors = resolve_errors("class A < A {}");

        assert_eq!(
            errors,
            &["[line 1] Error at 'A': A class cannot inherit from itself"]
        );
    }

    #[test]
    fn test_return_inside_lambda_is_allowed() {
        let errors = resolve_errors("var f = fun () { return 1; }; print f;");

        assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
    }

    #[test]
    fn test_errors_accumulate() {
        let errors = resolve_errors("return 1;\nprint this;");

        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_globals_are_not_in_the_table() {
        assert_eq!(resolve_depths("var a = 1; print a;"), Vec::<usize>::new());
    }

    #[test]
    fn test_local_in_same_scope_resolves_at_zero() {
        assert_eq!(resolve_depths("{ var a = 1; print a; }"), vec![0]);
    }

    #[test]
    fn test_local_through_nested_block_resolves_at_one() {
        assert_eq!(resolve_depths("{ var a = 1; { print a; } }"), vec![1]);
    }

    #[test]
    fn test_closure_capture_distance() {
        // `n` is read from `inner`, one environment above its body frame.
        let depths = resolve_depths("fun make() { var n = 0; fun inner() { print n; } print inner; }");

        assert!(depths.contains(&1), "expected a depth-1 capture: {:?}", depths);
    }
}
