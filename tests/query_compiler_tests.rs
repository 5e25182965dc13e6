//! End-to-end query compilation: source pattern in, backend query
//! text out (optimizer included where noted).

use reiz::ir;
use reiz::query::{compile_query, QueryError};
use reiz::schema::Schema;

fn schema() -> Schema {
    Schema::bootstrap().unwrap()
}

fn compile(source: &str) -> String {
    ir::construct(&compile_query(source, &schema()).unwrap())
}

fn compile_optimized(source: &str) -> String {
    ir::construct(&ir::optimize(compile_query(source, &schema()).unwrap()))
}

#[test]
fn bare_matcher_selects_everything() {
    assert_eq!(compile("Name()"), "SELECT ast::Name");
}

#[test]
fn enum_filter_compiles_to_equality() {
    assert_eq!(
        compile("Name(ctx=Load())"),
        "SELECT ast::Name\nFILTER .ctx = <ast::expr_context>'Load'"
    );
}

#[test]
fn constant_filter_uses_the_renamed_field() {
    assert_eq!(
        compile("Name('foo')"),
        "SELECT ast::Name\nFILTER .py_id = 'foo'"
    );
}

#[test]
fn constant_node_values_are_matched_by_repr() {
    let compiled = compile("Constant(1)");
    assert!(compiled.contains(".value = '1'"), "{compiled}");
    let compiled = compile("Constant('foo')");
    assert!(compiled.contains(".value = \"'foo'\""), "{compiled}");
}

#[test]
fn nested_matchers_chain_through_type_assertions() {
    let compiled = compile("Call(func=Attribute(attr='read'))");
    assert!(
        compiled.contains(".func[IS ast::Attribute].attr = 'read'"),
        "{compiled}"
    );
}

#[test]
fn bare_nested_matcher_is_a_type_test() {
    let compiled = compile("Return(Tuple())");
    assert!(compiled.contains(".value IS ast::Tuple"), "{compiled}");
}

#[test]
fn list_match_binds_an_ordered_sequence() {
    let compiled = compile("FunctionDef(body=[Assign(), Return()])");
    assert!(compiled.contains("WITH"), "{compiled}");
    assert!(compiled.contains("sequence_"), "{compiled}");
    assert!(compiled.contains("array_agg"), "{compiled}");
    assert!(compiled.contains("ORDER BY @index"), "{compiled}");
    assert!(compiled.contains("count(.body) = 2"), "{compiled}");
    assert!(compiled.contains("[0] IS ast::Assign"), "{compiled}");
    assert!(compiled.contains("[1] IS ast::Return"), "{compiled}");
}

#[test]
fn expansion_anchors_the_tail_with_negative_indices() {
    let compiled = compile("FunctionDef(body=[Assign(), *..., Return()])");
    assert!(compiled.contains("count(.body) >= 2"), "{compiled}");
    assert!(compiled.contains("[0] IS ast::Assign"), "{compiled}");
    assert!(compiled.contains("[-1] IS ast::Return"), "{compiled}");
}

#[test]
fn ignored_slots_only_verify_length() {
    let compiled = compile("FunctionDef(body=[..., ...])");
    assert_eq!(
        compiled,
        "SELECT ast::FunctionDef\nFILTER count(.body) = 2"
    );
}

#[test]
fn set_match_uses_any_element_semantics() {
    let compiled = compile("FunctionDef(body={Return(Tuple())})");
    assert!(
        compiled.contains(".body[IS ast::Return].value IS ast::Tuple"),
        "{compiled}"
    );
    // no sequence binding, no length verifier
    assert!(!compiled.contains("count("), "{compiled}");
    assert!(!compiled.contains("sequence_"), "{compiled}");
}

#[test]
fn decorated_function_scenario() {
    let compiled = compile("FunctionDef(decorator_list=[Name('classmethod')], body={Return(Tuple())})");
    assert!(
        compiled.contains("[IS ast::Name].py_id = 'classmethod'"),
        "{compiled}"
    );
    assert!(compiled.contains("count(.decorator_list) = 1"), "{compiled}");
    assert!(
        compiled.contains(".body[IS ast::Return].value IS ast::Tuple"),
        "{compiled}"
    );
}

#[test]
fn references_compare_structural_tags() {
    let compiled = compile("Call(func=~f, args=[~f])");
    assert!(compiled.contains("count(.args) = 1"), "{compiled}");
    assert!(compiled.contains("[0]._tag = .func._tag"), "{compiled}");
}

#[test]
fn scalar_references_compare_values_directly() {
    let compiled = compile("FunctionDef(name=~n, body={Name(~n)})");
    // identifier captures compare the raw field, not tags
    assert!(!compiled.contains("_tag"), "{compiled}");
    assert!(compiled.contains(".py_id = .name"), "{compiled}");
}

#[test]
fn unused_references_are_rejected() {
    let error = compile_query("Call(func=~f)", &schema()).unwrap_err();
    assert!(
        matches!(&error, QueryError::Compiler { message, .. } if message.contains("unused reference")),
        "{error}"
    );
}

#[test]
fn reference_type_mismatch_is_rejected() {
    let error = compile_query("Call(func=~f, keywords=[~f])", &schema()).unwrap_err();
    assert!(error.to_string().contains("different grammar type"), "{error}");
}

#[test]
fn negated_constant_is_inverted_by_the_optimizer() {
    assert_eq!(
        compile_optimized("Name(not 'foo')"),
        "SELECT ast::Name\nFILTER .py_id != 'foo'"
    );
}

#[test]
fn absent_field_compiles_to_not_exists() {
    let compiled = compile("Return(value=None)");
    assert!(compiled.contains("NOT EXISTS .value"), "{compiled}");
}

#[test]
fn double_negation_folds_to_exists() {
    let compiled = compile_optimized("arg(annotation=not None)");
    assert!(compiled.contains("FILTER EXISTS .annotation"), "{compiled}");
    assert!(!compiled.contains("NOT"), "{compiled}");
}

#[test]
fn type_alternation_coalesces_into_a_union_test() {
    let compiled = compile_optimized("Return(Name() | Tuple())");
    assert!(
        compiled.contains(".value IS (ast::Name | ast::Tuple)"),
        "{compiled}"
    );
}

#[test]
fn match_strings_compile_to_like() {
    let compiled = compile("Name(f'test_%')");
    assert!(compiled.contains(".py_id LIKE 'test_%'"), "{compiled}");
}

#[test]
fn case_insensitive_match_strings_compile_to_ilike() {
    let compiled = compile("Name(I(f'llvm%'))");
    assert!(compiled.contains(".py_id ILIKE 'llvm%'"), "{compiled}");
}

#[test]
fn length_builtin_bounds_the_sequence() {
    let compiled = compile("FunctionDef(body=LEN(min=3, max=10))");
    assert!(compiled.contains("count(.body) >= 3"), "{compiled}");
    assert!(compiled.contains("count(.body) <= 10"), "{compiled}");
}

#[test]
fn length_builtin_requires_a_bound() {
    let error = compile_query("FunctionDef(body=LEN())", &schema()).unwrap_err();
    assert!(error.to_string().contains("at least one"), "{error}");
}

#[test]
fn quantifier_builtins_wrap_the_inner_filter() {
    let compiled = compile("FunctionDef(body=ANY(Return()))");
    assert!(compiled.contains("any(.body IS ast::Return)"), "{compiled}");
}

#[test]
fn metadata_parent_predicate_tests_parent_types() {
    let schema = schema();
    let function_id = schema.model().type_id("FunctionDef").unwrap();
    let compiled =
        ir::construct(&compile_query("Name(__metadata__=META(parent=FunctionDef(body=...)))", &schema).unwrap());
    assert!(
        compiled.contains(&format!("({function_id}, 'body') IN ._parent_types")),
        "{compiled}"
    );
}

#[test]
fn metadata_must_use_the_metadata_keyword() {
    let error = compile_query("Name(id=META(parent=FunctionDef(body=...)))", &schema()).unwrap_err();
    assert!(error.to_string().contains("__metadata__"), "{error}");
}

#[test]
fn logical_operators_combine_filters() {
    let compiled = compile("Name(id='a' | 'b')");
    assert!(
        compiled.contains("(.py_id = 'a') OR (.py_id = 'b')"),
        "{compiled}"
    );
    let compiled = compile("Name(id=f'a%' & f'%b')");
    assert!(compiled.contains("LIKE 'a%'"), "{compiled}");
    assert!(compiled.contains("LIKE '%b'"), "{compiled}");
}

#[test]
fn nested_list_matches_disambiguate_index_with_a_loop() {
    let compiled = compile("Call(args=[Call(args=[Name()])])");
    assert!(compiled.contains("FOR _singleton IN"), "{compiled}");
    assert!(compiled.contains("_singleton[IS ast::Call].args"), "{compiled}");
    // two sequence bindings, one per nesting level
    let bindings = compiled.matches("array_agg").count();
    assert_eq!(bindings, 2, "{compiled}");
}
