use pitonflow_chipset::*;

fn channel(tag: u8) -> ChannelId { ChannelId::new(tag).unwrap() }

#[test]
fn no_frame_crosses_while_gated() {
    let mut system = System::new(ChipsetConfig::genesys2(), 3).unwrap();
    system.enable_trace();
    for i in 0..4 {
        system.send(Direction::ChipToChipset, channel(1), Flit::new(i));
        system.send(Direction::ChipsetToChip, channel(3), Flit::new(0x10 + i));
    }

    assert!(system.run_until_ready(500));
    system.run_core_ticks(200);
    system.set_reset(true);
    system.run_core_ticks(20);
    assert!(!system.sequencer().ready());
    system.set_reset(false);
    assert!(system.run_until_ready(500));
    system.run_core_ticks(50);

    let trace = system.link_trace();
    assert!(trace.iter().any(|entry| !entry.gate));
    assert!(trace.iter().any(|entry| entry.frames.iter().any(Option::is_some)));
    for entry in trace.iter().filter(|entry| !entry.gate) {
        assert!(entry.frames.iter().all(Option::is_none), "frame at {} ps while gated", entry.time_ps);
    }
    assert_eq!(system.delivered(Direction::ChipToChipset, channel(1)).len(), 4);
    assert_eq!(system.delivered(Direction::ChipsetToChip, channel(3)).len(), 4);
}

#[test]
fn bring_up_waits_for_both_clocks() {
    let mut system = System::new(ChipsetConfig::vc707(), 0).unwrap();
    system.set_chip_clk_locked(false);
    system.run_core_ticks(300);
    assert_eq!(system.sequencer().phase(), ResetPhase::ClockWait);
    assert_eq!(system.chip().status(), LinkStatus::Down);

    system.set_chip_clk_locked(true);
    assert!(system.run_until_ready(200));
    assert_eq!(system.rearms(), 0);
}

#[test]
fn external_reset_drops_in_flight_state_and_rearms() {
    let mut system = System::new(ChipsetConfig::genesys2(), 5).unwrap();
    assert!(system.run_until_ready(500));
    let ch = channel(1);
    system.set_consumer(Direction::ChipToChipset, ch, ConsumerMode::Never);
    for i in 0..10 {
        system.send(Direction::ChipToChipset, ch, Flit::new(i));
    }
    system.run_core_ticks(100);
    assert_eq!(system.admitted(Direction::ChipToChipset, ch).len(), 8);
    assert_eq!(system.chipset().occupancy(ch.index()), 8);

    system.set_reset(true);
    system.run_core_ticks(10);
    assert!(!system.sequencer().ready());
    assert_eq!(system.chip().status(), LinkStatus::Down);
    assert_eq!(system.chip().staged(ch.index()), 0);
    assert_eq!(system.chipset().occupancy(ch.index()), 0);
    assert_eq!(system.chip().tracker().credits_available(ch.index()), 8);
    assert_eq!(system.chipset().tracker().pending(ch.index()), 0);
    assert_eq!(system.chip().tracker().credits_outstanding(ch.index()), 0);

    system.set_reset(false);
    system.set_consumer(Direction::ChipToChipset, ch, ConsumerMode::Always);
    assert!(system.run_until_ready(500));
    for i in 100..103 {
        system.send(Direction::ChipToChipset, ch, Flit::new(i));
    }
    assert!(system.run_until_quiescent(500));

    assert_eq!(system.rearms(), 1);
    let admitted = system.admitted(Direction::ChipToChipset, ch);
    let expected = [8, 9, 100, 101, 102].map(Flit::new);
    assert_eq!(&admitted[8..], &expected);
    assert_eq!(system.delivered(Direction::ChipToChipset, ch), &expected);
    assert_eq!(system.credit_ledger(Direction::ChipToChipset, ch).total(), 8);
}

#[test]
fn reset_with_two_flits_on_the_wire_delivers_nothing() {
    let mut system = System::new(ChipsetConfig::genesys2(), 17).unwrap();
    assert!(system.run_until_ready(500));
    let ch = channel(3);
    system.send(Direction::ChipToChipset, ch, Flit::new(0x1));
    system.send(Direction::ChipToChipset, ch, Flit::new(0x2));

    let mut ticks = 0;
    while system.credit_ledger(Direction::ChipToChipset, ch).data_in_flight < 2 {
        assert!(ticks < 50, "flits never reached the wire");
        system.run_core_ticks(1);
        ticks += 1;
    }
    assert_eq!(
        system.credit_ledger(Direction::ChipToChipset, ch),
        CreditLedger { available: 6, data_in_flight: 2, ..Default::default() }
    );

    system.set_reset(true);
    system.run_core_ticks(10);
    assert!(system.delivered(Direction::ChipToChipset, ch).is_empty());
    assert_eq!(system.chip().tracker().credits_outstanding(ch.index()), 0);
    assert_eq!(system.chipset().tracker().pending(ch.index()), 0);
    assert_eq!(system.chipset().occupancy(ch.index()), 0);

    system.set_reset(false);
    assert!(system.run_until_ready(500));
    system.run_core_ticks(50);
    assert!(system.delivered(Direction::ChipToChipset, ch).is_empty());
    assert_eq!(system.credit_ledger(Direction::ChipToChipset, ch), CreditLedger { available: 8, ..Default::default() });
    assert_eq!(system.rearms(), 1);
}

#[test]
fn lock_glitch_rearms() {
    let mut system = System::new(ChipsetConfig::nexys_video(), 9).unwrap();
    assert!(system.run_until_ready(500));

    system.glitch_ref_clk_lock(5);
    system.run_core_ticks(2);
    assert!(!system.sequencer().ready());
    assert_eq!(system.rearms(), 1);

    assert!(system.run_until_ready(500));
    system.send(Direction::ChipsetToChip, channel(2), Flit::new(0x55));
    assert!(system.run_until_quiescent(500));
    assert_eq!(system.delivered(Direction::ChipsetToChip, channel(2)), &[Flit::new(0x55)]);
}

#[test]
fn scheduled_resets_lose_only_a_prefix_of_in_flight_flits() {
    let mut system = System::new(ChipsetConfig::genesys2().with_buffer_depth(4), 11).unwrap();
    system.schedule_reset(800);
    system.schedule_reset(1_600);
    let report = system.run_random(2_400, 0.5, ConsumerMode::Random(0.6));

    assert_eq!(report.rearms, 2);
    report.verify().unwrap();
    assert!(report.channels.iter().all(|channel| channel.delivered > 0 && channel.delivered <= channel.sent));
}

#[test]
fn bit_error_latches_link_down_until_reset() {
    let mut system = System::new(ChipsetConfig::genesys2(), 13).unwrap();
    assert!(system.run_until_ready(500));
    system.run_core_ticks(20);
    let ch = channel(2);

    system.send(Direction::ChipToChipset, ch, Flit::new(0xA));
    system.run_core_ticks(100);
    assert_eq!(system.delivered(Direction::ChipToChipset, ch), &[Flit::new(0xA)]);

    system.corrupt_next(Direction::ChipToChipset, 3);
    system.send(Direction::ChipToChipset, ch, Flit::new(0xB));
    system.run_core_ticks(100);
    assert!(matches!(system.chipset().fault(), Some(LinkFault::Checksum { .. })));
    assert_eq!(system.chipset().status(), LinkStatus::Down);
    assert_eq!(system.chipset().stats().faults, 1);
    assert_eq!(system.chip().status(), LinkStatus::Up);
    assert_eq!(system.delivered(Direction::ChipToChipset, ch), &[Flit::new(0xA)]);

    // Nothing gets through until the link is re-armed.
    system.send(Direction::ChipsetToChip, ch, Flit::new(0xC));
    system.run_core_ticks(100);
    assert!(system.delivered(Direction::ChipsetToChip, ch).is_empty());

    system.set_reset(true);
    system.run_core_ticks(10);
    system.set_reset(false);
    assert!(system.run_until_ready(500));
    system.run_core_ticks(20);
    assert_eq!(system.chipset().status(), LinkStatus::Up);
    assert!(system.chipset().fault().is_none());

    system.send(Direction::ChipToChipset, ch, Flit::new(0xD));
    assert!(system.run_until_quiescent(500));
    assert_eq!(system.delivered(Direction::ChipToChipset, ch), &[Flit::new(0xA), Flit::new(0xD)]);
}

#[test]
fn noisy_link_never_delivers_a_corrupted_flit() {
    for seed in 0..4 {
        let mut config = ChipsetConfig::genesys2().with_buffer_depth(4);
        config.link.bit_error_rate = 0.002;
        let mut system = System::new(config, seed).unwrap();
        for at in [600, 1_200, 1_800] {
            system.schedule_reset(at);
        }
        let report = system.run_random(2_400, 0.5, ConsumerMode::Random(0.7));

        report.verify().unwrap();
        assert!(report.bridges.iter().any(|bridge| bridge.faults > 0), "seed {}", seed);
        assert!(report.channels.iter().all(|channel| channel.delivered <= channel.sent));
    }
}
