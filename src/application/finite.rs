//! Rejects NaN and infinite floats anywhere inside a serializable value.
//!
//! JSON has no representation for them and `serde_json` silently writes
//! `null`, which would let distinct contents share an ID and break reloads.

use std::fmt;

use serde::ser::{
    self, Serialize, SerializeMap, SerializeSeq, SerializeStruct, SerializeStructVariant,
    SerializeTuple, SerializeTupleStruct, SerializeTupleVariant, Serializer,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum FiniteError {
    #[error("non-finite number")]
    NonFinite,
    #[error("{0}")]
    Custom(String),
}

impl ser::Error for FiniteError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Self::Custom(msg.to_string())
    }
}

/// Walk `value` and fail on the first NaN or infinity.
pub(crate) fn ensure_finite<T>(value: &T) -> Result<(), FiniteError>
where
    T: Serialize + ?Sized,
{
    value.serialize(FiniteCheck)
}

#[derive(Clone, Copy)]
struct FiniteCheck;

type Checked = Result<(), FiniteError>;

impl Serializer for FiniteCheck {
    type Ok = ();
    type Error = FiniteError;
    type SerializeSeq = Self;
    type SerializeTuple = Self;
    type SerializeTupleStruct = Self;
    type SerializeTupleVariant = Self;
    type SerializeMap = Self;
    type SerializeStruct = Self;
    type SerializeStructVariant = Self;

    fn serialize_bool(self, _v: bool) -> Checked {
        Ok(())
    }

    fn serialize_i8(self, _v: i8) -> Checked {
        Ok(())
    }

    fn serialize_i16(self, _v: i16) -> Checked {
        Ok(())
    }

    fn serialize_i32(self, _v: i32) -> Checked {
        Ok(())
    }

    fn serialize_i64(self, _v: i64) -> Checked {
        Ok(())
    }

    fn serialize_i128(self, _v: i128) -> Checked {
        Ok(())
    }

    fn serialize_u8(self, _v: u8) -> Checked {
        Ok(())
    }

    fn serialize_u16(self, _v: u16) -> Checked {
        Ok(())
    }

    fn serialize_u32(self, _v: u32) -> Checked {
        Ok(())
    }

    fn serialize_u64(self, _v: u64) -> Checked {
        Ok(())
    }

    fn serialize_u128(self, _v: u128) -> Checked {
        Ok(())
    }

    fn serialize_f32(self, v: f32) -> Checked {
        self.serialize_f64(f64::from(v))
    }

    fn serialize_f64(self, v: f64) -> Checked {
        if v.is_finite() {
            Ok(())
        } else {
            Err(FiniteError::NonFinite)
        }
    }

    fn serialize_char(self, _v: char) -> Checked {
        Ok(())
    }

    fn serialize_str(self, _v: &str) -> Checked {
        Ok(())
    }

    fn serialize_bytes(self, _v: &[u8]) -> Checked {
        Ok(())
    }

    fn serialize_none(self) -> Checked {
        Ok(())
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Checked {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Checked {
        Ok(())
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Checked {
        Ok(())
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
    ) -> Checked {
        Ok(())
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Checked {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        value: &T,
    ) -> Checked {
        value.serialize(self)
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self, FiniteError> {
        Ok(self)
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self, FiniteError> {
        Ok(self)
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self, FiniteError> {
        Ok(self)
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self, FiniteError> {
        Ok(self)
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self, FiniteError> {
        Ok(self)
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<Self, FiniteError> {
        Ok(self)
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self, FiniteError> {
        Ok(self)
    }
}

impl SerializeSeq for FiniteCheck {
    type Ok = ();
    type Error = FiniteError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Checked {
        value.serialize(*self)
    }

    fn end(self) -> Checked {
        Ok(())
    }
}

impl SerializeTuple for FiniteCheck {
    type Ok = ();
    type Error = FiniteError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Checked {
        value.serialize(*self)
    }

    fn end(self) -> Checked {
        Ok(())
    }
}

impl SerializeTupleStruct for FiniteCheck {
    type Ok = ();
    type Error = FiniteError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Checked {
        value.serialize(*self)
    }

    fn end(self) -> Checked {
        Ok(())
    }
}

impl SerializeTupleVariant for FiniteCheck {
    type Ok = ();
    type Error = FiniteError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Checked {
        value.serialize(*self)
    }

    fn end(self) -> Checked {
        Ok(())
    }
}

impl SerializeMap for FiniteCheck {
    type Ok = ();
    type Error = FiniteError;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> Checked {
        key.serialize(*self)
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> Checked {
        value.serialize(*self)
    }

    fn end(self) -> Checked {
        Ok(())
    }
}

impl SerializeStruct for FiniteCheck {
    type Ok = ();
    type Error = FiniteError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, _key: &'static str, value: &T) -> Checked {
        value.serialize(*self)
    }

    fn end(self) -> Checked {
        Ok(())
    }
}

impl SerializeStructVariant for FiniteCheck {
    type Ok = ();
    type Error = FiniteError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, _key: &'static str, value: &T) -> Checked {
        value.serialize(*self)
    }

    fn end(self) -> Checked {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde::Serialize;
    use serde_json::json;

    use super::*;

    #[derive(Serialize)]
    struct Reading {
        label: &'static str,
        values: Vec<Option<f64>>,
    }

    #[derive(Serialize)]
    enum Sample {
        Point(f32),
        Range { low: f64, high: f64 },
    }

    #[test]
    fn finite_values_pass() {
        let reading = Reading {
            label: "ok",
            values: vec![Some(1.5), None, Some(-0.0)],
        };
        assert!(ensure_finite(&reading).is_ok());
        assert!(ensure_finite(&json!({"a": [1, 2.5, "x", null]})).is_ok());
        assert!(ensure_finite(&(1u8, 'c', b"bytes".as_slice())).is_ok());
    }

    #[test]
    fn nested_nan_is_rejected() {
        let reading = Reading {
            label: "bad",
            values: vec![Some(1.0), Some(f64::NAN)],
        };
        assert!(matches!(
            ensure_finite(&reading),
            Err(FiniteError::NonFinite)
        ));
    }

    #[test]
    fn infinities_in_variants_and_map_values_are_rejected() {
        assert!(ensure_finite(&Sample::Point(f32::INFINITY)).is_err());
        assert!(
            ensure_finite(&Sample::Range {
                low: f64::NEG_INFINITY,
                high: 0.0,
            })
            .is_err()
        );

        let mut map = BTreeMap::new();
        map.insert("limit", f64::INFINITY);
        assert!(ensure_finite(&map).is_err());
    }
}
