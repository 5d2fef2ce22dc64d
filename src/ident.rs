macro_rules! identifier {
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
            derive_more::Display,
            serde::Serialize,
            serde::Deserialize,
        )]
        pub struct $name(usize);

        impl $name {
            pub const ZERO: $name = Self::new(0);
            pub const ONE: $name = Self::new(1);

            pub const fn new(value: usize) -> Self {
                Self(value)
            }

            pub fn into_usize(self) -> usize {
                self.0
            }
        }
    };
}

identifier!(NodeId);
identifier!(LinkId);
identifier!(PacketId);
identifier!(GeneratorId);

impl PacketId {
    /// Returns this identifier and advances `self` to the next one.
    pub(crate) fn bump(&mut self) -> Self {
        let cur = *self;
        self.0 += 1;
        cur
    }
}
