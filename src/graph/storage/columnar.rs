//! Columnar storage for attribute values.
//!
//! Each attribute owns one typed column indexed by element id. A slot holds
//! `None` while the element carries the attribute's default value, so only
//! explicitly set values occupy memory.

use crate::graph::value::{AttributeType, AttributeValue, Color, ConversionFailure};

macro_rules! columns {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        /// A single attribute column.
        #[derive(Debug, Clone, PartialEq)]
        pub enum Column {
            $($variant(Vec<Option<$ty>>),)*
        }

        impl Column {
            pub fn for_type(attribute_type: AttributeType) -> Self {
                match attribute_type {
                    $(AttributeType::$variant => Column::$variant(Vec::new()),)*
                }
            }

            pub fn attribute_type(&self) -> AttributeType {
                match self {
                    $(Column::$variant(_) => AttributeType::$variant,)*
                }
            }

            /// Stored value at `idx`, `None` if the slot holds the default
            pub fn get(&self, idx: usize) -> Option<AttributeValue> {
                match self {
                    $(Column::$variant(v) => v
                        .get(idx)
                        .and_then(|o| o.clone())
                        .map(AttributeValue::$variant),)*
                }
            }

            /// Store `value` at `idx` (converted to the column's type) and return
            /// the previous stored value
            pub fn set(
                &mut self,
                idx: usize,
                value: Option<AttributeValue>,
            ) -> Result<Option<AttributeValue>, ConversionFailure> {
                let value = match value {
                    Some(v) => Some(v.convert(self.attribute_type())?),
                    None => None,
                };
                let previous = match (self, value) {
                    $((Column::$variant(v), Some(AttributeValue::$variant(val))) => {
                        if idx >= v.len() { v.resize(idx + 1, None); }
                        v[idx].replace(val).map(AttributeValue::$variant)
                    })*
                    $((Column::$variant(v), None) => {
                        v.get_mut(idx).and_then(Option::take).map(AttributeValue::$variant)
                    })*
                    // convert() always yields the column's own variant
                    _ => None,
                };
                Ok(previous)
            }

            /// Indices that currently hold a non-default value
            pub fn set_indices(&self) -> Vec<usize> {
                match self {
                    $(Column::$variant(v) => v
                        .iter()
                        .enumerate()
                        .filter_map(|(i, o)| o.as_ref().map(|_| i))
                        .collect(),)*
                }
            }
        }
    };
}

columns!(
    Byte(i8),
    Short(i16),
    Integer(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Boolean(bool),
    Char(char),
    String(String),
    Color(Color),
    Object(serde_json::Value),
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_set_and_get() {
        let mut col = Column::for_type(AttributeType::Integer);
        assert_eq!(col.get(3), None);
        assert_eq!(col.set(3, Some(AttributeValue::Integer(7))).unwrap(), None);
        assert_eq!(col.get(3), Some(AttributeValue::Integer(7)));
        assert_eq!(col.set_indices(), vec![3]);
        assert_eq!(
            col.set(3, Some(AttributeValue::Integer(9))).unwrap(),
            Some(AttributeValue::Integer(7))
        );
    }

    #[test]
    fn test_column_converts_on_set() {
        let mut col = Column::for_type(AttributeType::Long);
        col.set(0, Some(AttributeValue::from("12"))).unwrap();
        assert_eq!(col.get(0), Some(AttributeValue::Long(12)));
        assert!(col.set(1, Some(AttributeValue::from("twelve"))).is_err());
        assert_eq!(col.get(1), None);
    }

    #[test]
    fn test_column_unset_and_indices() {
        let mut col = Column::for_type(AttributeType::String);
        col.set(1, Some("a".into())).unwrap();
        col.set(4, Some("b".into())).unwrap();
        assert_eq!(col.set_indices(), vec![1, 4]);
        assert_eq!(col.set(1, None).unwrap(), Some("a".into()));
        assert_eq!(col.set(10, None).unwrap(), None);
        assert_eq!(col.set_indices(), vec![4]);
        assert_eq!(col.attribute_type(), AttributeType::String);
    }
}
