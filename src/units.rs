use crate::time::{Delta, Time};

macro_rules! unit {
    ($name: ident) => {
        #[derive(
            Debug,
            Default,
            Copy,
            Clone,
            PartialOrd,
            Ord,
            PartialEq,
            Eq,
            Hash,
            derive_more::Add,
            derive_more::Sub,
            derive_more::AddAssign,
            derive_more::SubAssign,
            derive_more::Display,
            derive_more::FromStr,
            serde::Serialize,
            serde::Deserialize,
        )]
        pub struct $name(u64);

        impl $name {
            pub const ZERO: $name = Self::new(0);
            pub const ONE: $name = Self::new(1);

            pub const fn new(value: u64) -> Self {
                Self(value)
            }

            pub const fn into_f64(self) -> f64 {
                self.0 as f64
            }

            pub fn scale_by(self, val: f64) -> Self {
                let inner = self.0 as f64 * val;
                Self(inner.round() as u64)
            }
        }
    };
}

unit!(Nanosecs);
unit!(Millisecs);
unit!(Secs);

impl Nanosecs {
    pub fn into_time(self) -> Time {
        Time::new(u128::from(self.0))
    }

    pub fn into_delta(self) -> Delta {
        Delta::new(u128::from(self.0))
    }

    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / 1e9
    }
}

impl Millisecs {
    pub const fn into_ns(self) -> Nanosecs {
        Nanosecs::new(self.0 * 1_000_000)
    }

    pub fn into_time(self) -> Time {
        self.into_ns().into_time()
    }

    pub fn into_delta(self) -> Delta {
        self.into_ns().into_delta()
    }
}

impl Secs {
    pub const fn into_ms(self) -> Millisecs {
        Millisecs::new(self.0 * 1_000)
    }

    pub const fn into_ns(self) -> Nanosecs {
        self.into_ms().into_ns()
    }

    pub fn into_time(self) -> Time {
        self.into_ms().into_time()
    }

    pub fn into_delta(self) -> Delta {
        self.into_ms().into_delta()
    }
}

impl From<Millisecs> for Nanosecs {
    fn from(ms: Millisecs) -> Self {
        ms.into_ns()
    }
}

impl From<Secs> for Nanosecs {
    fn from(s: Secs) -> Self {
        s.into_ns()
    }
}

impl From<Nanosecs> for Time {
    fn from(ns: Nanosecs) -> Self {
        ns.into_time()
    }
}

impl From<Millisecs> for Time {
    fn from(ms: Millisecs) -> Self {
        ms.into_time()
    }
}

impl From<Secs> for Time {
    fn from(s: Secs) -> Self {
        s.into_time()
    }
}

unit!(Bits);
unit!(Bytes);

impl Bytes {
    pub fn into_bits(self) -> Bits {
        Bits::new(self.0 * 8)
    }
}

impl From<Bytes> for Bits {
    fn from(val: Bytes) -> Self {
        val.into_bits()
    }
}

unit!(BitsPerSec);

impl BitsPerSec {
    pub fn into_mbps_f64(self) -> f64 {
        self.0 as f64 / 1_000_000_f64
    }

    /// Time needed to clock `size` onto a wire running at this rate.
    pub fn length(&self, size: Bytes) -> Nanosecs {
        assert!(*self != BitsPerSec::ZERO);
        if size == Bytes::ZERO {
            return Nanosecs::ZERO;
        }
        let bits = size.into_bits().into_f64();
        let bps = self.into_f64();
        let delta = (bits * 1e9) / bps;
        let delta = delta.round() as u64;
        Nanosecs::new(delta)
    }
}
