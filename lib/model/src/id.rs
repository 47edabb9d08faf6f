//! A compact 64-bit term id.
//!
//! High 4 bits: type tag. Low 60 bits: either a dictionary sequence number
//! (for [`TypeTag::Iri`], [`TypeTag::BlankNode`], [`TypeTag::PlainLiteral`],
//! [`TypeTag::LangLiteral`], [`TypeTag::TypedLiteral`]) or an inline-encoded
//! numeric/datetime payload (for the four `Inline*` tags).

use crate::error::TermError;
use crate::term::{NumericLiteral, Term, DECIMAL_SCALE};

/// Number of bits reserved for the dictionary sequence number / inline payload.
pub const PAYLOAD_BITS: u32 = 60;
pub const PAYLOAD_MASK: u64 = (1u64 << PAYLOAD_BITS) - 1;
/// Largest sequence number the dictionary counter may hand out before overflow.
pub const MAX_SEQUENCE: u64 = PAYLOAD_MASK;

/// Offset added to signed 60-bit-range integers so that unsigned big-endian byte
/// comparison preserves signed numeric order.
pub const SIGNED_PAYLOAD_BIAS: i64 = 1i64 << (PAYLOAD_BITS - 1);
/// Inline integers/decimals/datetimes outside `[-BIAS, BIAS)` fall back to the dictionary.
pub const INLINE_SIGNED_MIN: i64 = -SIGNED_PAYLOAD_BIAS;
pub const INLINE_SIGNED_MAX: i64 = SIGNED_PAYLOAD_BIAS - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TypeTag {
    Iri = 0,
    BlankNode = 1,
    PlainLiteral = 2,
    TypedLiteral = 3,
    LangLiteral = 4,
    InlineInteger = 5,
    InlineDecimal = 6,
    InlineDouble = 7,
    InlineDateTime = 8,
}

impl TypeTag {
    pub fn is_inline(self) -> bool {
        matches!(
            self,
            TypeTag::InlineInteger | TypeTag::InlineDecimal | TypeTag::InlineDouble | TypeTag::InlineDateTime
        )
    }

    fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            0 => TypeTag::Iri,
            1 => TypeTag::BlankNode,
            2 => TypeTag::PlainLiteral,
            3 => TypeTag::TypedLiteral,
            4 => TypeTag::LangLiteral,
            5 => TypeTag::InlineInteger,
            6 => TypeTag::InlineDecimal,
            7 => TypeTag::InlineDouble,
            8 => TypeTag::InlineDateTime,
            _ => return None,
        })
    }
}

/// A 64-bit term id. Stable for the store's lifetime; two distinct terms never share one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TermId(u64);

impl TermId {
    pub fn from_raw(raw: u64) -> Self {
        TermId(raw)
    }

    pub fn to_raw(self) -> u64 {
        self.0
    }

    pub fn to_be_bytes(self) -> [u8; 8] {
        self.0.to_be_bytes()
    }

    pub fn from_be_bytes(bytes: [u8; 8]) -> Self {
        TermId(u64::from_be_bytes(bytes))
    }

    pub fn tag(self) -> Result<TypeTag, TermError> {
        let tag_bits = (self.0 >> PAYLOAD_BITS) as u8;
        TypeTag::from_u8(tag_bits).ok_or(TermError::UnknownTypeTag(self.0, tag_bits))
    }

    pub fn payload(self) -> u64 {
        self.0 & PAYLOAD_MASK
    }

    pub fn is_inline(self) -> bool {
        self.tag().map(TypeTag::is_inline).unwrap_or(false)
    }

    fn compose(tag: TypeTag, payload: u64) -> Self {
        debug_assert!(payload <= PAYLOAD_MASK);
        TermId(((tag as u64) << PAYLOAD_BITS) | (payload & PAYLOAD_MASK))
    }

    pub fn from_sequence(tag: TypeTag, sequence: u64) -> Self {
        debug_assert!(!tag.is_inline());
        Self::compose(tag, sequence)
    }

    /// Dictionary sequence number for a non-inline id (the value allocated by the
    /// sequence counter, not the encoded term id itself).
    pub fn sequence(self) -> Option<u64> {
        if self.is_inline() {
            None
        } else {
            Some(self.payload())
        }
    }
}

fn encode_signed(v: i64) -> Option<u64> {
    if !(INLINE_SIGNED_MIN..=INLINE_SIGNED_MAX).contains(&v) {
        return None;
    }
    Some((v + SIGNED_PAYLOAD_BIAS) as u64)
}

fn decode_signed(payload: u64) -> i64 {
    payload as i64 - SIGNED_PAYLOAD_BIAS
}

/// Number of low mantissa bits zeroed before the sortable transform so the 64-bit transform
/// fits in the 60-bit inline payload. Inline doubles therefore carry 48 mantissa bits instead
/// of the full 52 -- about 14 significant decimal digits rather than ~15.7 -- rounded toward
/// zero in magnitude. Values needing the full 52 bits round slightly in the lossy direction;
/// callers that require bit-exact doubles should rely on the dictionary-backed
/// `Term::TypedLiteral` path instead (`try_inline` never refuses a finite double, so this
/// rounding is silent by design).
const DOUBLE_DROPPED_BITS: u32 = 4;
const DOUBLE_DROP_MASK: u64 = (1u64 << DOUBLE_DROPPED_BITS) - 1;

/// IEEE-754 sortable transform, compressed into 60 bits: flips the sign bit of positive
/// values, flips all bits of negative values (so unsigned comparison of the transformed bits
/// matches `f64` total order for all finite, non-NaN values), then drops the low
/// [`DOUBLE_DROPPED_BITS`] mantissa bits -- zeroed *before* the flip, so they carry no
/// information and the drop is lossless relative to the truncated value.
fn encode_double_sortable(v: f64) -> u64 {
    let truncated = v.to_bits() & !DOUBLE_DROP_MASK;
    let transform = if truncated & (1u64 << 63) == 0 { truncated | (1u64 << 63) } else { !truncated };
    transform >> DOUBLE_DROPPED_BITS
}

fn decode_double_sortable(payload: u64) -> f64 {
    // Bit 59 of the payload is bit 63 of the original transform: 1 for values encoded from
    // the positive branch above, 0 for the negative branch.
    let positive = payload >> (PAYLOAD_BITS - 1) & 1 == 1;
    let transform = if positive {
        // The dropped bits were exactly zero before the flip, so shifting them back in
        // reproduces the original transform with no further loss.
        payload << DOUBLE_DROPPED_BITS
    } else {
        // The negative branch's complement turned those same zero bits into ones; refill
        // them deterministically rather than losing them to the right-shift.
        (payload << DOUBLE_DROPPED_BITS) | DOUBLE_DROP_MASK
    };
    let bits = if transform & (1u64 << 63) != 0 { transform & !(1u64 << 63) } else { !transform };
    f64::from_bits(bits)
}

impl TermId {
    /// Attempts to inline-encode a numeric/datetime literal. Returns `None` when the value
    /// is outside the inline-representable range and must instead be dictionary-backed as a
    /// `Term::TypedLiteral`.
    pub fn try_inline(numeric: NumericLiteral) -> Option<TermId> {
        match numeric {
            NumericLiteral::Integer(v) => encode_signed(v).map(|p| Self::compose(TypeTag::InlineInteger, p)),
            NumericLiteral::Decimal(scaled) => {
                encode_signed(scaled).map(|p| Self::compose(TypeTag::InlineDecimal, p))
            }
            NumericLiteral::Double(v) if v.is_finite() => {
                Some(Self::compose(TypeTag::InlineDouble, encode_double_sortable(v)))
            }
            NumericLiteral::Double(_) => None, // NaN / infinite: not inline-representable.
            NumericLiteral::DateTime(secs) => encode_signed(secs).map(|p| Self::compose(TypeTag::InlineDateTime, p)),
        }
    }

    /// Decodes an inline id back into its numeric/datetime value. Returns `None` if `self`
    /// is not an inline id.
    pub fn decode_inline(self) -> Option<NumericLiteral> {
        let tag = self.tag().ok()?;
        let payload = self.payload();
        match tag {
            TypeTag::InlineInteger => Some(NumericLiteral::Integer(decode_signed(payload))),
            TypeTag::InlineDecimal => Some(NumericLiteral::Decimal(decode_signed(payload))),
            TypeTag::InlineDouble => Some(NumericLiteral::Double(decode_double_sortable(payload))),
            TypeTag::InlineDateTime => Some(NumericLiteral::DateTime(decode_signed(payload))),
            _ => None,
        }
    }
}

/// Converts a `Term` into its inline id, if eligible. `Term`s that are not numeric, or whose
/// value exceeds the inline-representable range, return `None`.
pub fn inline_id_for(term: &Term) -> Option<TermId> {
    if let Term::Numeric(n) = term {
        TermId::try_inline(*n)
    } else {
        None
    }
}

/// Decodes a `Term` from an inline id, reconstructing its canonical lexical form.
pub fn term_from_inline(id: TermId) -> Option<Term> {
    id.decode_inline().map(Term::Numeric)
}

pub fn decimal_to_scaled(value: f64) -> i64 {
    (value * DECIMAL_SCALE as f64).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_round_trips_through_inline() {
        for v in [0i64, 1, -1, 12345, -12345, INLINE_SIGNED_MIN, INLINE_SIGNED_MAX] {
            let id = TermId::try_inline(NumericLiteral::Integer(v)).unwrap();
            assert_eq!(id.decode_inline(), Some(NumericLiteral::Integer(v)));
        }
    }

    #[test]
    fn integer_out_of_range_falls_back() {
        assert!(TermId::try_inline(NumericLiteral::Integer(i64::MAX)).is_none());
        assert!(TermId::try_inline(NumericLiteral::Integer(i64::MIN)).is_none());
    }

    #[test]
    fn double_sortable_transform_preserves_order() {
        let values = [-100.5f64, -1.0, -0.0001, 0.0, 0.0001, 1.0, 100.5];
        let ids: Vec<TermId> =
            values.iter().map(|v| TermId::try_inline(NumericLiteral::Double(*v)).expect("inline")).collect();
        let mut by_raw = ids.clone();
        by_raw.sort_by(|a, b| a.to_raw().cmp(&b.to_raw()));
        assert_eq!(ids, by_raw, "ids were already produced in ascending order of value");

        for (id, v) in ids.iter().zip(values.iter()) {
            match id.decode_inline() {
                // Dropping the low mantissa bits (see `DOUBLE_DROPPED_BITS`) loses at most
                // ~2^-48 of relative precision; round-tripping is not bit-exact.
                Some(NumericLiteral::Double(d)) => assert!((d - v).abs() <= v.abs() * 1e-12 + 1e-12, "{d} vs {v}"),
                other => panic!("unexpected decode: {other:?}"),
            }
        }
    }

    #[test]
    fn every_finite_double_inline_encodes() {
        for v in [f64::MIN, f64::MIN_POSITIVE, -1.0, 0.0, 1.0, f64::MAX, 1.5e300, -1.5e-300] {
            assert!(TermId::try_inline(NumericLiteral::Double(v)).is_some(), "{v} should inline");
        }
        assert!(TermId::try_inline(NumericLiteral::Double(f64::NAN)).is_none());
        assert!(TermId::try_inline(NumericLiteral::Double(f64::INFINITY)).is_none());
    }

    #[test]
    fn distinct_tags_never_collide_on_raw_value() {
        let a = TermId::from_sequence(TypeTag::Iri, 42);
        let b = TermId::try_inline(NumericLiteral::Integer(42)).unwrap();
        assert_ne!(a, b);
    }
}
