//! Per-element validity codes.
//!
//! Every maskable array carries a parallel buffer of one-byte codes. The low
//! bit says whether the element's data is meaningful; the remaining seven bits
//! are an opaque payload that this crate neither interprets nor produces.

/// Validity of a single array element.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Validity {
    /// The element is missing; its data slot is "don't care".
    #[default]
    Hidden = 0,
    /// The element's data is meaningful.
    Exposed = 1,
}

impl Validity {
    /// Decode a raw mask byte. Only the low bit is significant.
    #[inline]
    pub fn from_code(code: u8) -> Self {
        if code & 1 == 1 {
            Validity::Exposed
        } else {
            Validity::Hidden
        }
    }

    /// Raw mask byte for this validity (payload bits are zero).
    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }

    #[inline]
    pub fn is_exposed(self) -> bool {
        self == Validity::Exposed
    }

    #[inline]
    pub fn is_hidden(self) -> bool {
        self == Validity::Hidden
    }
}

impl From<bool> for Validity {
    #[inline]
    fn from(exposed: bool) -> Self {
        if exposed {
            Validity::Exposed
        } else {
            Validity::Hidden
        }
    }
}

impl From<Validity> for bool {
    #[inline]
    fn from(v: Validity) -> Self {
        v.is_exposed()
    }
}

/// Build a mask buffer from raw bytes.
pub fn mask_from_codes(codes: &[u8]) -> Vec<Validity> {
    codes.iter().map(|&c| Validity::from_code(c)).collect()
}
