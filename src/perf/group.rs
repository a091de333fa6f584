//! Decoding of `PERF_FORMAT_GROUP` reads.

use crate::counters::NUM_COUNTERS;
use crate::{Error, Result};
use byteorder::{NativeEndian, ReadBytesExt};

/// Size of one group read: `nr`, `time_enabled`, `time_running` and one value per member.
pub const GROUP_READ_SIZE: usize = (3 + NUM_COUNTERS) * std::mem::size_of::<u64>();

/// One read of a counter group opened with
/// `PERF_FORMAT_GROUP | PERF_FORMAT_TOTAL_TIME_ENABLED | PERF_FORMAT_TOTAL_TIME_RUNNING`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupReading {
    /// Total time the group was enabled.
    pub time_enabled: u64,
    /// Total time the group was scheduled on hardware.
    ///
    /// Less than `time_enabled` when the kernel multiplexed the counters.
    pub time_running: u64,
    /// Member values in the order the members were opened.
    pub values: [u64; NUM_COUNTERS],
}

impl GroupReading {
    /// Parse this structure from the serialized in-memory format provided by the kernel.
    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        if buf.len() < 3 * std::mem::size_of::<u64>() {
            return Err(Error::ShortRead {
                expected: NUM_COUNTERS,
                actual: 0,
            });
        }
        let mut ptr = std::io::Cursor::new(buf);
        let nr = ptr.read_u64::<NativeEndian>()? as usize;
        let time_enabled = ptr.read_u64::<NativeEndian>()?;
        let time_running = ptr.read_u64::<NativeEndian>()?;
        let available = (buf.len() - 3 * std::mem::size_of::<u64>()) / std::mem::size_of::<u64>();
        if nr < NUM_COUNTERS || available < NUM_COUNTERS {
            return Err(Error::ShortRead {
                expected: NUM_COUNTERS,
                actual: std::cmp::min(nr, available),
            });
        }
        let mut values = [0u64; NUM_COUNTERS];
        for v in values.iter_mut() {
            *v = ptr.read_u64::<NativeEndian>()?;
        }
        Ok(GroupReading {
            time_enabled,
            time_running,
            values,
        })
    }

    /// Check if the kernel had to share the hardware with other events.
    #[inline]
    pub fn multiplexed(&self) -> bool {
        self.time_running < self.time_enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::WriteBytesExt;

    fn encode(words: &[u64]) -> Vec<u8> {
        let mut buf = Vec::new();
        for w in words {
            buf.write_u64::<NativeEndian>(*w).unwrap();
        }
        buf
    }

    #[test]
    fn test_group_decode() -> crate::Result<()> {
        let buf = encode(&[4, 900, 600, 10, 20, 3, 40]);
        assert_eq!(buf.len(), GROUP_READ_SIZE);
        let reading = GroupReading::from_bytes(&buf)?;
        assert_eq!(reading.time_enabled, 900);
        assert_eq!(reading.time_running, 600);
        assert_eq!(reading.values, [10, 20, 3, 40]);
        assert!(reading.multiplexed());
        Ok(())
    }

    #[test]
    fn test_group_decode_truncated() {
        let buf = encode(&[4, 900, 900, 10, 20]);
        match GroupReading::from_bytes(&buf) {
            Err(Error::ShortRead { expected, actual }) => {
                assert_eq!(expected, 4);
                assert_eq!(actual, 2);
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_group_decode_missing_members() {
        let buf = encode(&[3, 900, 900, 10, 20, 3, 0]);
        match GroupReading::from_bytes(&buf) {
            Err(Error::ShortRead { actual, .. }) => assert_eq!(actual, 3),
            other => panic!("unexpected result {:?}", other),
        }
        assert!(GroupReading::from_bytes(&[0u8; 4]).is_err());
    }
}
