use crate::engine::core::column::ScalarType;
use crate::test_helpers::factory::Factory;
use crate::test_helpers::factories::RowSchemaFactory;

#[test]
fn mixed_cycles_scalar_types() {
    let mixed = RowSchemaFactory::mixed(6).create();
    let scalars: Vec<ScalarType> = mixed.columns.iter().map(|c| c.scalar()).collect();
    assert_eq!(
        scalars,
        vec![
            ScalarType::U32,
            ScalarType::U8,
            ScalarType::U64,
            ScalarType::U16,
            ScalarType::U32,
            ScalarType::U8,
        ]
    );
    assert_eq!(mixed.schema.len(), 6);
}

#[test]
fn values_fit_their_columns() {
    let mixed = Factory::row_schema()
        .with_column(ScalarType::U8)
        .with_column(ScalarType::U16)
        .create();
    for row in 0..1000 {
        assert!(mixed.value(row, 0) <= u8::MAX as u64);
        assert!(mixed.value(row, 1) <= u16::MAX as u64);
    }
    assert_eq!(mixed.expected_rows(3).len(), 3);
}
