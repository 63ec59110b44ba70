//! Encoder configuration and BIH flag sets.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Stripe/layer/plane output order (the `order` byte of the BIH).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Order(u8);

impl Order {
    /// No order flags: layers outermost, then stripes, then planes.
    pub const NONE: Self = Self(0);
    /// Send the highest resolution layer first.
    pub const HITOLO: Self = Self(0x08);
    /// Send all stripes of a layer and plane before moving on.
    pub const SEQ: Self = Self(0x04);
    /// Interleave planes within a stripe.
    pub const ILEAVE: Self = Self(0x02);
    /// Stripe loop in the middle.
    pub const SMID: Self = Self(0x01);

    /// Raw flag byte.
    #[inline]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Build from a raw flag byte without checking for reserved bits.
    #[inline]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    /// Returns true if every flag of `other` is set.
    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Index of the loop nesting selected by `SEQ`, `ILEAVE` and `SMID`.
    #[inline]
    pub const fn nesting(self) -> usize {
        (self.0 & 0x07) as usize
    }

    /// Returns true for the two flag combinations that select no valid
    /// loop nesting (`SMID` alone and all three low flags).
    #[inline]
    pub const fn is_illegal(self) -> bool {
        matches!(self.0 & 0x07, 1 | 7)
    }

    /// Replace an illegal nesting by `ILEAVE | SMID`, keeping `HITOLO`.
    pub const fn normalized(self) -> Self {
        if self.is_illegal() {
            Self((self.0 & !0x07) | Self::ILEAVE.0 | Self::SMID.0)
        } else {
            self
        }
    }
}

impl BitOr for Order {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for Order {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Order({:#04x})", self.0)
    }
}

/// Coding options.
///
/// The low seven bits are the `options` byte of the BIH. [`Options::DELAY_AT`]
/// and [`Options::SDRST`] only steer the encoder and are never written.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Options(u16);

impl Options {
    /// No options.
    pub const NONE: Self = Self(0);
    /// Two-line template for the lowest resolution layer.
    pub const LRLTWO: Self = Self(0x40);
    /// The BIH height may be revised by a NEWLEN marker.
    pub const VLENGTH: Self = Self(0x20);
    /// Typical prediction in differential layers.
    pub const TPDON: Self = Self(0x10);
    /// Typical prediction in the lowest resolution layer.
    pub const TPBON: Self = Self(0x08);
    /// Deterministic prediction.
    pub const DPON: Self = Self(0x04);
    /// A private DP table is used.
    pub const DPPRIV: Self = Self(0x02);
    /// Reuse the private DP table of the previous BIE.
    pub const DPLAST: Self = Self(0x01);
    /// Announce template changes after the stripe in which they were found.
    pub const DELAY_AT: Self = Self(0x100);
    /// Terminate every stripe with SDRST instead of SDNORM.
    pub const SDRST: Self = Self(0x200);

    /// Raw option bits.
    #[inline]
    pub const fn bits(self) -> u16 {
        self.0
    }

    /// Build from raw option bits.
    #[inline]
    pub const fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    /// Returns true if every flag of `other` is set.
    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// The option bits that go into the BIH.
    #[inline]
    pub const fn header_byte(self) -> u8 {
        (self.0 & 0x7f) as u8
    }

    /// Returns true if a private DP table follows the BIH.
    #[inline]
    pub const fn has_private_table(self) -> bool {
        self.0 & 0x07 == Self::DPON.0 | Self::DPPRIV.0
    }
}

impl BitOr for Options {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for Options {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Options({:#05x})", self.0)
    }
}

/// Encoder parameters that end up in the BIH.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderConfig {
    /// Output order.
    pub order: Order,
    /// Coding options.
    pub options: Options,
    /// Lines per stripe at the lowest resolution; 0 picks a value from the
    /// image height.
    pub l0: u32,
    /// Largest horizontal adaptive template offset (0 disables AT).
    pub mx: u8,
    /// Vertical adaptive template offset, always 0.
    pub my: u8,
}

impl EncoderConfig {
    /// Progressive default: interleaved planes, stripes in the middle, all
    /// prediction modes, adaptive template up to 8 pixels.
    pub const DEFAULT: Self = Self {
        order: Order::from_bits(Order::ILEAVE.bits() | Order::SMID.bits()),
        options: Options::from_bits(
            Options::TPBON.bits() | Options::TPDON.bits() | Options::DPON.bits(),
        ),
        l0: 0,
        mx: 8,
        my: 0,
    };

    /// Single resolution layer in the style of fax profiles: three-line
    /// template, typical prediction, 128-line stripes.
    pub const SINGLE_LAYER: Self = Self {
        order: Order::NONE,
        options: Options::TPBON,
        l0: 128,
        mx: 8,
        my: 0,
    };
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EncoderConfig::default();
        assert_eq!(config.order.bits(), 0x03);
        assert_eq!(config.options.bits(), 0x1c);
        assert_eq!(config.mx, 8);
        assert_eq!(config.l0, 0);
    }

    #[test]
    fn test_single_layer_config() {
        let config = EncoderConfig::SINGLE_LAYER;
        assert_eq!(config.order, Order::NONE);
        assert!(config.options.contains(Options::TPBON));
        assert!(!config.options.contains(Options::DPON));
        assert_eq!(config.l0, 128);
    }

    #[test]
    fn test_order_normalization() {
        assert_eq!(Order::SMID.normalized(), Order::ILEAVE | Order::SMID);
        let all = Order::HITOLO | Order::SEQ | Order::ILEAVE | Order::SMID;
        assert_eq!(all.normalized(), Order::HITOLO | Order::ILEAVE | Order::SMID);
        assert_eq!(Order::SEQ.normalized(), Order::SEQ);
        assert_eq!((Order::HITOLO | Order::ILEAVE).nesting(), 2);
    }

    #[test]
    fn test_options_header_byte() {
        let options = Options::TPBON | Options::SDRST | Options::DELAY_AT;
        assert_eq!(options.header_byte(), 0x08);
        assert!((Options::DPON | Options::DPPRIV).has_private_table());
        assert!(!(Options::DPON | Options::DPPRIV | Options::DPLAST).has_private_table());
        assert!(!Options::DPPRIV.has_private_table());
    }
}
