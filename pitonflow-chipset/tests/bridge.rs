use pitonflow_chipset::*;

fn channel(tag: u8) -> ChannelId { ChannelId::new(tag).unwrap() }

fn ready_system(config: ChipsetConfig, seed: u64) -> System {
    let mut system = System::new(config, seed).unwrap();
    assert!(system.run_until_ready(500));
    system
}

#[test]
fn single_flit_crosses_on_its_channel() {
    let mut system = ready_system(ChipsetConfig::genesys2().with_buffer_depth(1), 0);
    system.enable_trace();

    system.send(Direction::ChipToChipset, channel(2), Flit::new(0xAAAA));
    while system.admitted(Direction::ChipToChipset, channel(2)).is_empty() {
        system.run_core_ticks(1);
    }
    assert_eq!(system.chip().tracker().credits_available(channel(2).index()), 0);
    system.run_core_ticks(100);

    assert_eq!(system.delivered(Direction::ChipToChipset, channel(2)), &[Flit::new(0xAAAA)]);
    for other in [channel(1), channel(3)] {
        assert!(system.delivered(Direction::ChipToChipset, other).is_empty());
    }
    for channel in ChannelId::all() {
        assert!(system.delivered(Direction::ChipsetToChip, channel).is_empty());
    }

    let data_frames = system
        .link_trace()
        .iter()
        .filter_map(|entry| entry.frames[0].as_ref())
        .filter_map(|frame| frame.flit())
        .map(|(id, flit)| (id.tag(), *flit))
        .collect::<Vec<_>>();
    assert_eq!(data_frames, vec![(2, Flit::new(0xAAAA))]);

    // The credit came back.
    let ledger = system.credit_ledger(Direction::ChipToChipset, channel(2));
    assert_eq!(ledger.total(), 1);
    assert_eq!(ledger.available, 1);
}

/// Sends a flit from the chip on channel 2 and returns the core ticks until it is admitted, until it is delivered, and
/// until its credit is back at the chip.
fn roundtrip(system: &mut System, flit: Flit) -> (u64, u64, u64) {
    let (direction, ch) = (Direction::ChipToChipset, channel(2));
    let start = system.core_ticks();
    let before = system.delivered(direction, ch).len();
    system.send(direction, ch, flit);

    let (mut admitted, mut delivered) = (None, None);
    while system.core_ticks() - start < 100 {
        system.run_core_ticks(1);
        let now = system.core_ticks() - start;
        if admitted.is_none() && system.admitted(direction, ch).last() == Some(&flit) {
            admitted = Some(now);
        }
        if delivered.is_none() && system.delivered(direction, ch).len() > before {
            delivered = Some(now);
        }
        if let (Some(admitted), Some(delivered)) = (admitted, delivered) {
            if system.chip().tracker().credits_available(ch.index()) == 1 {
                return (admitted, delivered, now);
            }
        }
    }
    panic!("{} did not complete a roundtrip", flit);
}

#[test]
fn roundtrip_latency() {
    let mut system = ready_system(ChipsetConfig::genesys2().with_buffer_depth(1), 0);
    assert_eq!(roundtrip(&mut system, Flit::new(0x1)), (1, 10, 17));

    // The link clock runs 5:4 against the core clock, so start from every phase.
    for (i, offset) in (0..4).enumerate() {
        system.run_core_ticks(offset);
        let (admitted, delivered, restored) = roundtrip(&mut system, Flit::new(0x10 + i as u64));
        assert_eq!(admitted, 1);
        assert!((8..=12).contains(&delivered), "delivered after {} ticks", delivered);
        assert!((15..=19).contains(&restored), "credit restored after {} ticks", restored);
    }
}

#[test]
fn stalled_consumer_stops_admission_at_buffer_depth() {
    let mut system = ready_system(ChipsetConfig::genesys2().with_buffer_depth(2), 1);
    let ch = channel(1);
    system.set_consumer(Direction::ChipToChipset, ch, ConsumerMode::Never);

    let flits = (0..5).map(|i| Flit::new(0x100 + i)).collect::<Vec<_>>();
    for flit in &flits {
        system.send(Direction::ChipToChipset, ch, *flit);
    }
    system.run_core_ticks(200);

    assert_eq!(system.admitted(Direction::ChipToChipset, ch), &flits[..2]);
    assert_eq!(system.queued(Direction::ChipToChipset, ch), 3);
    assert!(system.delivered(Direction::ChipToChipset, ch).is_empty());
    assert_eq!(system.chipset().occupancy(ch.index()), 2);
    assert_eq!(system.chip().tracker().credits_available(ch.index()), 0);

    // Other channels are not blocked.
    system.send(Direction::ChipToChipset, channel(2), Flit::new(0x200));
    system.run_core_ticks(100);
    assert_eq!(system.delivered(Direction::ChipToChipset, channel(2)), &[Flit::new(0x200)]);
    assert_eq!(system.queued(Direction::ChipToChipset, ch), 3);

    system.set_consumer(Direction::ChipToChipset, ch, ConsumerMode::Always);
    assert!(system.run_until_quiescent(500));
    assert_eq!(system.delivered(Direction::ChipToChipset, ch), flits.as_slice());
}

#[test]
fn credits_are_conserved_and_streams_stay_in_order() {
    let clocks = [
        (10_000, 8_000, 0),
        (5_000, 12_500, 0),
        (10_000, 10_000, 3_000),
        (8_000, 24_000, 1_000),
        (12_000, 4_000, 500),
    ];
    for (seed, (core_period_ps, link_period_ps, link_phase_ps)) in clocks.into_iter().enumerate() {
        let mut config = ChipsetConfig::genesys2().with_buffer_depth(4).with_threshold(2);
        config.clock = ClockConfig { core_period_ps, link_period_ps, link_phase_ps };
        let mut system = ready_system(config, seed as u64);

        system.set_all_consumers(ConsumerMode::Random(0.5));
        system.set_injection_rate(Some(0.6));
        for _ in 0..2_000 {
            system.run_core_ticks(1);
            for direction in Direction::ALL {
                for channel in ChannelId::all() {
                    assert_eq!(
                        system.credit_ledger(direction, channel).total(),
                        4,
                        "{} channel {} at {} ps",
                        direction,
                        channel,
                        system.now_ps()
                    );
                }
            }
        }

        system.set_injection_rate(None);
        system.set_all_consumers(ConsumerMode::Always);
        assert!(system.run_until_quiescent(2_000));

        for direction in Direction::ALL {
            for channel in ChannelId::all() {
                let admitted = system.admitted(direction, channel);
                assert!(!admitted.is_empty());
                assert_eq!(system.delivered(direction, channel), admitted);
                let stats = &system.receiver(direction).stats().channels[channel.index()];
                assert!(stats.max_occupancy <= 4);
            }
        }
        assert_eq!(system.rearms(), 0);
    }
}

#[test]
fn credit_only_frames_return_credits_without_reverse_traffic() {
    let mut system = ready_system(ChipsetConfig::piton_board(), 7);
    let ch = channel(1);

    // More flits than credits, in one direction only.
    for i in 0..20 {
        system.send(Direction::ChipToChipset, ch, Flit::new(i));
    }
    assert!(system.run_until_quiescent(5_000));

    assert_eq!(system.delivered(Direction::ChipToChipset, ch).len(), 20);
    assert!(system.chipset().stats().credit_only_frames > 0);
    assert_eq!(system.chip().stats().credit_only_frames, 0);
}

#[test]
fn random_run_report() {
    let mut system = System::new(ChipsetConfig::vcu118(), 42).unwrap();
    let report = system.run_random(3_000, 0.4, ConsumerMode::Random(0.7));
    report.verify().unwrap();
    assert_eq!(report.rearms, 0);
    assert!(report.channels.iter().all(|channel| channel.sent > 0 && channel.sent == channel.delivered));
    assert!(report.bridges.iter().all(|bridge| bridge.status == LinkStatus::Up && bridge.faults == 0));
    assert!(report.to_string().contains("chip->chipset"));
}
