/// Approximates how much memory a value uses, in bytes.
///
/// This is an advisory estimate used for the store's `memory_bytes_estimate`
/// stat: cheap to compute, allowed to be off by allocator overhead and
/// shared-ownership double counting (`Arc`ed strings are counted at every
/// holder).
pub trait SizeBytes {
    /// The size of the heap data owned by this value, in bytes.
    fn heap_size_bytes(&self) -> u64;

    /// The total size of this value: its inline footprint plus
    /// [`Self::heap_size_bytes`].
    #[inline]
    fn total_size_bytes(&self) -> u64
    where
        Self: Sized,
    {
        std::mem::size_of::<Self>() as u64 + self.heap_size_bytes()
    }
}

macro_rules! impl_size_bytes_pod {
    ($($t:ty),+) => {
        $(impl SizeBytes for $t {
            #[inline]
            fn heap_size_bytes(&self) -> u64 {
                0
            }
        })+
    };
}

impl_size_bytes_pod!(u8, u16, u32, u64, usize, i8, i16, i32, i64, isize, f32, f64, bool);

impl SizeBytes for String {
    #[inline]
    fn heap_size_bytes(&self) -> u64 {
        self.capacity() as u64
    }
}

impl SizeBytes for std::sync::Arc<str> {
    #[inline]
    fn heap_size_bytes(&self) -> u64 {
        self.len() as u64
    }
}

impl<T: SizeBytes> SizeBytes for Option<T> {
    #[inline]
    fn heap_size_bytes(&self) -> u64 {
        self.as_ref().map_or(0, SizeBytes::heap_size_bytes)
    }
}

impl<T: SizeBytes> SizeBytes for Vec<T> {
    fn heap_size_bytes(&self) -> u64 {
        (self.capacity() * std::mem::size_of::<T>()) as u64
            + self.iter().map(SizeBytes::heap_size_bytes).sum::<u64>()
    }
}

impl<A: smallvec::Array> SizeBytes for smallvec::SmallVec<A>
where
    A::Item: SizeBytes,
{
    fn heap_size_bytes(&self) -> u64 {
        let spilled = if self.spilled() {
            (self.capacity() * std::mem::size_of::<A::Item>()) as u64
        } else {
            0 // inline storage is covered by `size_of::<Self>`
        };
        spilled + self.iter().map(SizeBytes::heap_size_bytes).sum::<u64>()
    }
}

impl SizeBytes for serde_json::Value {
    fn heap_size_bytes(&self) -> u64 {
        match self {
            serde_json::Value::Null
            | serde_json::Value::Bool(_)
            | serde_json::Value::Number(_) => 0,

            serde_json::Value::String(s) => s.capacity() as u64,

            serde_json::Value::Array(values) => {
                (values.len() * std::mem::size_of::<serde_json::Value>()) as u64
                    + values.iter().map(SizeBytes::heap_size_bytes).sum::<u64>()
            }

            serde_json::Value::Object(map) => map
                .iter()
                .map(|(key, value)| {
                    (key.capacity() + std::mem::size_of::<serde_json::Value>()) as u64
                        + value.heap_size_bytes()
                })
                .sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_json_is_counted() {
        let value = serde_json::json!({
            "name": "observer",
            "tags": ["a", "b", "c"],
        });
        assert!(value.heap_size_bytes() > "observer".len() as u64);
    }

    #[test]
    fn total_includes_the_inline_part() {
        let v: Vec<u64> = vec![1, 2, 3];
        assert_eq!(
            v.total_size_bytes(),
            std::mem::size_of::<Vec<u64>>() as u64 + 3 * 8
        );
    }
}
