// Based on quinn-proto's VarInt, restricted to what the control and object codecs need.

use std::fmt;

use thiserror::Error;

use crate::coding::{Decode, DecodeError, Encode};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Error)]
#[error("value out of range")]
pub struct BoundsExceeded;

/// An integer less than 2^62
///
/// Values of this type are suitable for encoding as QUIC variable-length integer.
/// The two most significant bits of the first byte select the encoded length (1, 2, 4 or 8 bytes).
#[derive(Default, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct VarInt(u64);

impl VarInt {
	/// The largest possible value.
	pub const MAX: Self = Self((1 << 62) - 1);

	/// The smallest possible value.
	pub const ZERO: Self = Self(0);

	/// Construct a `VarInt` infallibly using the largest available type.
	pub const fn from_u32(x: u32) -> Self {
		Self(x as u64)
	}

	pub const fn from_u64(x: u64) -> Option<Self> {
		if x <= Self::MAX.0 {
			Some(Self(x))
		} else {
			None
		}
	}

	/// Extract the integer value
	pub const fn into_inner(self) -> u64 {
		self.0
	}

	/// The number of bytes needed to encode this value.
	pub const fn size(self) -> usize {
		let x = self.0;
		if x < 2u64.pow(6) {
			1
		} else if x < 2u64.pow(14) {
			2
		} else if x < 2u64.pow(30) {
			4
		} else {
			8
		}
	}
}

impl From<VarInt> for u64 {
	fn from(x: VarInt) -> Self {
		x.0
	}
}

impl From<u8> for VarInt {
	fn from(x: u8) -> Self {
		Self(x.into())
	}
}

impl From<u16> for VarInt {
	fn from(x: u16) -> Self {
		Self(x.into())
	}
}

impl From<u32> for VarInt {
	fn from(x: u32) -> Self {
		Self(x.into())
	}
}

impl TryFrom<u64> for VarInt {
	type Error = BoundsExceeded;

	/// Succeeds iff `x` < 2^62
	fn try_from(x: u64) -> Result<Self, BoundsExceeded> {
		Self::from_u64(x).ok_or(BoundsExceeded)
	}
}

impl TryFrom<usize> for VarInt {
	type Error = BoundsExceeded;

	fn try_from(x: usize) -> Result<Self, BoundsExceeded> {
		Self::try_from(x as u64)
	}
}

impl fmt::Debug for VarInt {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.0.fmt(f)
	}
}

impl fmt::Display for VarInt {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.0.fmt(f)
	}
}

impl Decode for VarInt {
	fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
		if !r.has_remaining() {
			return Err(DecodeError::Short);
		}

		// Peek at the length class before consuming anything.
		let size = 1usize << (r.chunk()[0] >> 6);
		if r.remaining() < size {
			return Err(DecodeError::Short);
		}

		let x = match size {
			1 => u64::from(r.get_u8() & 0x3f),
			2 => u64::from(r.get_u16() & 0x3fff),
			4 => u64::from(r.get_u32() & 0x3fff_ffff),
			_ => r.get_u64() & 0x3fff_ffff_ffff_ffff,
		};

		Ok(Self(x))
	}
}

impl Encode for VarInt {
	fn encode<W: bytes::BufMut>(&self, w: &mut W) {
		let x = self.0;
		match self.size() {
			1 => w.put_u8(x as u8),
			2 => w.put_u16((0b01 << 14) | x as u16),
			4 => w.put_u32((0b10 << 30) | x as u32),
			_ => w.put_u64((0b11 << 62) | x),
		}
	}
}

impl Decode for u64 {
	fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
		VarInt::decode(r).map(u64::from)
	}
}

impl Encode for u64 {
	/// Panics if the value does not fit in a varint; callers bound their values first.
	fn encode<W: bytes::BufMut>(&self, w: &mut W) {
		VarInt::try_from(*self).expect("u64 exceeds varint range").encode(w);
	}
}

impl Decode for usize {
	fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
		let v = u64::decode(r)?;
		usize::try_from(v).map_err(|_| DecodeError::BoundsExceeded)
	}
}

impl Encode for usize {
	fn encode<W: bytes::BufMut>(&self, w: &mut W) {
		(*self as u64).encode(w);
	}
}
