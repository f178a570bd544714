//! Numeric and structural invariants of the clock divider and the chain.

use platform::mocks::MockMemory;
use platform::registers::dma as ti;
use proptest::prelude::*;
use transmitter::chain::required_words;
use transmitter::clock::{MAX_FREQUENCY_HZ, MIN_FREQUENCY_HZ};
use transmitter::encoder::{self, EncoderTargets};
use transmitter::{ChainFull, ClockConfig, ClockError, DescriptorChain, MashStage, MAX_DESCRIPTORS};

const PLL_HZ: u128 = 1_000_000_000;
const BASE: u32 = 0xC010_0000;

fn chain(capacity: usize) -> DescriptorChain<MockMemory> {
    DescriptorChain::with_capacity(MockMemory::new(BASE, required_words(capacity)), capacity).unwrap()
}

proptest! {
    /// `divi * f + divf * f / 4096` lands within one fractional step below
    /// the PLL frequency.
    #[test]
    fn divider_reconstructs_the_reference(f in MIN_FREQUENCY_HZ..=MAX_FREQUENCY_HZ) {
        let config = ClockConfig::for_frequency(f).unwrap();
        let f = u128::from(f);
        let scaled = u128::from(config.divi) * f * 4096 + u128::from(config.divf) * f;
        let reference = PLL_HZ * 4096;

        prop_assert!(config.divf < 4096);
        prop_assert!(scaled <= reference);
        prop_assert!(reference - scaled < f);
    }

    #[test]
    fn out_of_band_is_rejected(f in prop_oneof![0..MIN_FREQUENCY_HZ, (MAX_FREQUENCY_HZ + 1)..=u32::MAX]) {
        prop_assert_eq!(ClockConfig::for_frequency(f), Err(ClockError::OutOfRange(f)));
    }

    #[test]
    fn mash_stage_follows_the_band(f in MIN_FREQUENCY_HZ..=MAX_FREQUENCY_HZ) {
        let expected = if f < 100_000_000 {
            MashStage::Three
        } else if f <= 150_000_000 {
            MashStage::Two
        } else {
            MashStage::One
        };
        prop_assert_eq!(ClockConfig::for_frequency(f).unwrap().mash, expected);
    }

    /// n symbols give 2n + 1 blocks, one linear path ending at null, and
    /// only the last block raises an interrupt.
    #[test]
    fn chain_shape(sequence in "[01 x]{0,120}") {
        let mut c = chain(MAX_DESCRIPTORS);
        let samples = c.sample_addresses();
        let n = sequence.chars().filter(|ch| matches!(ch, '0' | '1')).count();

        let built = encoder::build(&mut c, &sequence, &samples, &EncoderTargets::default()).unwrap();
        prop_assert_eq!(built, 2 * n + 1);

        let blocks: Vec<_> = c.walk().collect();
        prop_assert_eq!(blocks.len(), 2 * n + 1);
        for (position, (index, block)) in blocks.iter().enumerate() {
            prop_assert_eq!(*index, position);
            let last = position + 1 == blocks.len();
            prop_assert_eq!(block.info & ti::TI_INT_EN != 0, last);
            if last {
                prop_assert_eq!(block.next, 0);
            } else {
                prop_assert_eq!(Some(block.next), c.slot_address(position + 1));
            }
        }
    }

    /// Appending past capacity reports `ChainFull` and leaves the prefix a
    /// valid chain.
    #[test]
    fn overflow_keeps_a_valid_prefix(capacity in 1usize..32, extra in 1usize..8) {
        let mut c = chain(capacity);
        for i in 0..capacity {
            c.append(BASE, BASE + 4, 4).unwrap();
            prop_assert_eq!(c.len(), i + 1);
        }
        for _ in 0..extra {
            prop_assert_eq!(c.append(BASE, BASE + 4, 4).err(), Some(ChainFull { capacity }));
        }
        prop_assert!(c.is_overflowed());
        prop_assert_eq!(c.len(), capacity);
        prop_assert_eq!(c.walk().count(), capacity);
        prop_assert_eq!(c.descriptor(capacity - 1).map(|b| b.next), Some(0));
    }
}

#[test]
fn overflowed_chain_cannot_be_armed() {
    let mut c = chain(2);
    c.append(BASE, BASE, 4).unwrap();
    c.append(BASE, BASE, 4).unwrap();
    assert!(c.append(BASE, BASE, 4).is_err());

    let rejected = c.arm().unwrap_err();
    assert_eq!(rejected.reason, transmitter::chain::ArmError::Overflowed);

    let mut c = rejected.chain;
    c.reset();
    c.append(BASE, BASE, 4).unwrap();
    assert!(c.arm().is_ok());
}
