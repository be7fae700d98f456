#[test]
fn storage_slice_borrow_discipline() {
    let t = trybuild::TestCases::new();
    t.compile_fail("tests/ui/*.rs");
}
