//! Little-endian byte-array scalars with alignment 1.
//!
//! Account state is cast in place over raw account data, so every scalar
//! field must be safe to read at any offset and must carry the wire byte
//! order in memory.

macro_rules! pod_number {
    ($name:ident, $num:ty, $size:expr) => {
        #[derive(Clone, Copy, Debug, Default, PartialEq)]
        #[repr(transparent)]
        pub struct $name([u8; $size]);

        impl From<$num> for $name {
            #[inline(always)]
            fn from(value: $num) -> Self {
                $name(value.to_le_bytes())
            }
        }

        impl From<$name> for $num {
            #[inline(always)]
            fn from(value: $name) -> Self {
                <$num>::from_le_bytes(value.0)
            }
        }
    };
}

pod_number!(PodU64, u64, 8);
pod_number!(PodI64, i64, 8);
pod_number!(PodF64, f64, 8);
