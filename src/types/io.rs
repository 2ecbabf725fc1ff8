//! I/O sample data carried by RX I/O frames.
//!
//! Format (after the address, RSSI and options bytes):
//! ```text
//! [count:1] [channel_mask:2BE] then per sample:
//!   [digital:2BE]      (only if any DIO bit is set in the mask)
//!   [adc:2BE] * N      (one per enabled ADC channel, in order)
//! ```

use bytes::Buf;

/// Number of digital lines (DIO0-DIO8).
pub const DIGITAL_CHANNELS: usize = 9;

/// Number of analog inputs (ADC0-ADC5).
pub const ANALOG_CHANNELS: usize = 6;

/// Mask bits covering the digital lines.
const DIGITAL_MASK: u16 = 0x01ff;

/// First mask bit of the analog inputs.
const ANALOG_SHIFT: usize = 9;

/// Analog readings are 10-bit.
const ANALOG_VALUE_MASK: u16 = 0x03ff;

/// One set of readings taken at the same instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IoSample {
    /// Digital line states; `None` for lines not enabled.
    pub digital: [Option<bool>; DIGITAL_CHANNELS],
    /// Analog readings (0-1023); `None` for inputs not enabled.
    pub analog: [Option<u16>; ANALOG_CHANNELS],
}

impl IoSample {
    /// Returns the state of a digital line, if sampled.
    #[must_use]
    pub fn digital(&self, line: usize) -> Option<bool> {
        self.digital.get(line).copied().flatten()
    }

    /// Returns the reading of an analog input, if sampled.
    #[must_use]
    pub fn analog(&self, channel: usize) -> Option<u16> {
        self.analog.get(channel).copied().flatten()
    }
}

/// All samples from one RX I/O frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IoSamples {
    /// Channel mask as sent by the module.
    pub mask: u16,
    /// Samples in arrival order.
    pub samples: Vec<IoSample>,
}

impl IoSamples {
    /// Parses sample data.
    ///
    /// Returns `None` if the data is shorter than the header or the
    /// samples it announces.
    #[must_use]
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < 3 {
            return None;
        }

        let mut cursor = std::io::Cursor::new(data);
        let count = cursor.get_u8();
        let mask = cursor.get_u16();

        let has_digital = mask & DIGITAL_MASK != 0;
        let analog_count = (0..ANALOG_CHANNELS)
            .filter(|ch| mask & (1 << (ANALOG_SHIFT + ch)) != 0)
            .count();
        let sample_len = usize::from(has_digital) * 2 + analog_count * 2;
        if cursor.remaining() < usize::from(count) * sample_len {
            return None;
        }

        let mut samples = Vec::with_capacity(usize::from(count));
        for _ in 0..count {
            let mut sample = IoSample::default();

            if has_digital {
                let bits = cursor.get_u16();
                for (line, state) in sample.digital.iter_mut().enumerate() {
                    if mask & (1 << line) != 0 {
                        *state = Some(bits & (1 << line) != 0);
                    }
                }
            }

            for (ch, reading) in sample.analog.iter_mut().enumerate() {
                if mask & (1 << (ANALOG_SHIFT + ch)) != 0 {
                    *reading = Some(cursor.get_u16() & ANALOG_VALUE_MASK);
                }
            }

            samples.push(sample);
        }

        Some(Self { mask, samples })
    }

    /// Returns the first sample, which is usually the only one.
    #[must_use]
    pub fn first(&self) -> Option<&IoSample> {
        self.samples.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_digital_and_analog() {
        // 1 sample, DIO0 + DIO2 + ADC0 + ADC1 enabled
        let data = [0x01, 0x06, 0x05, 0x00, 0x04, 0x02, 0x1f, 0x00, 0x80];
        let io = IoSamples::parse(&data).unwrap();

        assert_eq!(io.mask, 0x0605);
        let sample = io.first().unwrap();
        assert_eq!(sample.digital(0), Some(false));
        assert_eq!(sample.digital(1), None);
        assert_eq!(sample.digital(2), Some(true));
        assert_eq!(sample.analog(0), Some(0x021f));
        assert_eq!(sample.analog(1), Some(0x0080));
        assert_eq!(sample.analog(2), None);
    }

    #[test]
    fn test_parse_analog_only_multiple_samples() {
        // 2 samples, ADC3 only, no digital word
        let data = [0x02, 0x10, 0x00, 0x03, 0xff, 0x00, 0x01];
        let io = IoSamples::parse(&data).unwrap();

        assert_eq!(io.samples.len(), 2);
        assert_eq!(io.samples[0].analog(3), Some(0x03ff));
        assert_eq!(io.samples[1].analog(3), Some(0x0001));
        assert_eq!(io.samples[0].digital(0), None);
    }

    #[test]
    fn test_parse_short_data() {
        assert!(IoSamples::parse(&[0x01, 0x02]).is_none());
        // Announces a digital word that is missing
        assert!(IoSamples::parse(&[0x01, 0x00, 0x01, 0x00]).is_none());
    }
}
