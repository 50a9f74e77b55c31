//! Tests for Controller module

use super::*;
use crate::input::VirtualQuadBoard;
use crate::keymap::Color;
use crate::midi::MidiMessage;
use crate::profile::ProfileKind;
use crate::protocol;
use crate::transport::RecordingTransport;

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

fn make_controller(kind: ProfileKind, now: Instant) -> Controller<RecordingTransport> {
    let profile = DeviceProfile::for_kind(kind);
    let settings = ControllerSettings::from_config(&AppConfig::default(), &profile);
    Controller::new(profile, settings, RecordingTransport::new(), now)
}

fn tap_key(c: &mut Controller<RecordingTransport>, key: usize, at: Instant, held: Duration) {
    c.handle_event(InputEvent::KeyPressed(key), at);
    c.handle_event(InputEvent::KeyReleased(key), at + held);
}

fn turn(c: &mut Controller<RecordingTransport>, positions: impl IntoIterator<Item = i32>, at: Instant) {
    for pos in positions {
        c.handle_event(InputEvent::EncoderMoved(pos), at);
    }
}

fn pedal_pair(code: u16) -> Vec<MidiMessage> {
    vec![protocol::ketron_pedal(code, true), protocol::ketron_pedal(code, false)]
}

fn tab_pair(code: u16) -> Vec<MidiMessage> {
    vec![protocol::ketron_tab(code, true), protocol::ketron_tab(code, false)]
}

fn lock_shift(c: &mut Controller<RecordingTransport>, at: Instant) {
    tap_key(c, SHIFT_KEY, at, ms(300));
    assert_eq!(c.shift_state(), ShiftState::ActiveLock);
}

#[test]
fn test_start_stop_key_from_keymap() {
    let t0 = Instant::now();
    let mut c = make_controller(ProfileKind::EvmPlus, t0);

    assert_eq!(c.load_keymap_text("key00=0:Start/Stop:red\n", t0), Ok(0));
    let binding = c.cache().resolve_layer(0, Layer::Base);
    assert_eq!(binding.family(), Some(crate::commands::Family::Pedal));
    assert_eq!(binding.name(), "Start/Stop");
    assert_eq!(c.cache().color(0, Layer::Base), Color::RED);

    // Key 0 is the shift key: a quick tap fires its own base binding
    tap_key(&mut c, 0, t0, ms(50));
    assert_eq!(c.transport_mut().drain(), pedal_pair(0x12));
    assert_eq!(c.mode(), EncoderMode::Tempo);
    assert_eq!(c.shift_state(), ShiftState::Off);
}

#[test]
fn test_malformed_keymap_keeps_binding_and_flags_error() {
    let t0 = Instant::now();
    let mut c = make_controller(ProfileKind::EvmPlus, t0);
    assert_eq!(c.cache().resolve_layer(0, Layer::Base).name(), "VARIATION");

    let errors = c.load_keymap_text("key00=garbage", t0).unwrap_err();
    assert_eq!(errors.len(), 1);
    assert!(c.config_error());
    assert_eq!(c.cache().resolve_layer(0, Layer::Base).name(), "VARIATION");
    assert_eq!(c.surface().pixels, [Color::RED; KEY_COUNT]);

    // Start/Stop acknowledges the error
    c.handle_event(InputEvent::KeyPressed(9), t0 + ms(10));
    assert!(!c.config_error());
    assert_eq!(c.mode(), EncoderMode::Tempo);
    assert_ne!(c.surface().pixels, [Color::RED; KEY_COUNT]);
}

#[test]
fn test_partial_error_file_changes_nothing() {
    let t0 = Instant::now();
    let mut c = make_controller(ProfileKind::EvmPlus, t0);
    let before = c.cache().raw().clone();

    let text = "key00=0:Arr.B:green\nkey01=0:No Such Pedal:blue\n";
    assert!(c.load_keymap_text(text, t0).is_err());
    assert_eq!(c.cache().raw(), &before);
}

#[test]
fn test_shift_tap_and_lock() {
    let t0 = Instant::now();
    let mut c = make_controller(ProfileKind::EvmPlus, t0);

    // Tap within the hold threshold fires VARIATION once
    tap_key(&mut c, SHIFT_KEY, t0, ms(249));
    assert_eq!(c.transport_mut().drain(), tab_pair(0x09));
    assert_eq!(c.shift_state(), ShiftState::Off);

    // Held past the threshold latches the shift layer and fires nothing
    let t1 = t0 + ms(1000);
    lock_shift(&mut c, t1);
    assert!(c.transport_mut().drain().is_empty());
    assert_eq!(c.layer(), Layer::Shift);

    c.handle_event(InputEvent::KeyPressed(1), t1 + ms(500));
    assert_eq!(c.transport_mut().drain(), pedal_pair(0x28));

    // Pressing shift again unlocks
    tap_key(&mut c, SHIFT_KEY, t1 + ms(600), ms(50));
    assert_eq!(c.shift_state(), ShiftState::Off);
    assert!(c.transport_mut().drain().is_empty());
}

#[test]
fn test_momentary_shift() {
    let t0 = Instant::now();
    let mut c = make_controller(ProfileKind::EvmPlus, t0);

    c.handle_event(InputEvent::KeyPressed(SHIFT_KEY), t0);
    c.handle_event(InputEvent::KeyPressed(1), t0 + ms(20));
    assert_eq!(c.shift_state(), ShiftState::ActiveShift);
    c.handle_event(InputEvent::KeyReleased(1), t0 + ms(40));
    c.handle_event(InputEvent::KeyReleased(SHIFT_KEY), t0 + ms(60));

    assert_eq!(c.shift_state(), ShiftState::Off);
    assert_eq!(c.transport_mut().drain(), pedal_pair(0x28));
}

#[test]
fn test_macro_key_sends_steps_in_order() {
    let t0 = Instant::now();
    let mut c = make_controller(ProfileKind::EvmPlus, t0);
    c.load_keymap_text("key00=1:VARIATION:blue\nkey01=2:FArr.A:green\n", t0)
        .unwrap();

    c.handle_event(InputEvent::KeyPressed(1), t0);
    let mut expected = tab_pair(0x30);
    expected.extend(pedal_pair(0x03));
    assert_eq!(c.transport_mut().drain(), expected);

    // Shift layer default: PLUGGED → Drum Mute (two-byte code)
    lock_shift(&mut c, t0 + ms(100));
    c.handle_event(InputEvent::KeyPressed(10), t0 + ms(500));
    assert_eq!(c.transport_mut().drain(), pedal_pair(0x99));
}

#[test]
fn test_encoder_cycle() {
    let t0 = Instant::now();
    let mut c = make_controller(ProfileKind::EvmPlus, t0);
    assert_eq!(c.mode(), EncoderMode::Rotor);

    let modes: Vec<_> = (1..=3)
        .map(|i| {
            c.handle_event(InputEvent::EncoderSwitch, t0 + ms(i * 100));
            c.mode()
        })
        .collect();
    assert_eq!(
        modes,
        vec![EncoderMode::Tempo, EncoderMode::Volume, EncoderMode::Rotor]
    );
}

#[test]
fn test_rotor_is_edge_triggered() {
    let t0 = Instant::now();
    let mut c = make_controller(ProfileKind::EvmPlus, t0);

    // First sample is only a baseline
    turn(&mut c, [0, 1, 2, 3, 4], t0);
    assert_eq!(c.transport_mut().drain(), tab_pair(0x61));

    turn(&mut c, [3, 2, 1], t0);
    assert_eq!(c.transport_mut().drain(), tab_pair(0x60));
}

#[test]
fn test_tempo_is_level_triggered() {
    let t0 = Instant::now();
    let mut c = make_controller(ProfileKind::EvmPlus, t0);
    c.handle_event(InputEvent::EncoderSwitch, t0);

    turn(&mut c, [0, 1, 2, 3, 4], t0);
    let sent = c.transport_mut().drain();
    assert_eq!(sent.len(), 8);
    assert_eq!(sent[..2], pedal_pair(0x13)[..]);
}

#[test]
fn test_volume_mode_sends_expression() {
    let t0 = Instant::now();
    let mut c = make_controller(ProfileKind::EvmPlus, t0);
    c.handle_event(InputEvent::EncoderSwitch, t0);
    c.handle_event(InputEvent::EncoderSwitch, t0);

    turn(&mut c, [0, 1, 0], t0);
    assert_eq!(
        c.transport_mut().drain(),
        vec![
            MidiMessage::ControlChange { channel: 15, cc: 11, value: 108 },
            MidiMessage::ControlChange { channel: 15, cc: 11, value: 100 },
        ]
    );
    assert_eq!(c.master_volume(), 100);
}

#[test]
fn test_mode_timeout_reverts_to_rotor() {
    let t0 = Instant::now();
    let mut c = make_controller(ProfileKind::EvmPlus, t0);
    c.handle_event(InputEvent::EncoderSwitch, t0);
    assert_eq!(c.mode(), EncoderMode::Tempo);
    assert_eq!(c.surface().pixels[SHIFT_KEY], Color::YELLOW);

    c.poll(t0 + Duration::from_secs(60)).unwrap();
    assert_eq!(c.mode(), EncoderMode::Tempo);

    c.poll(t0 + Duration::from_secs(61)).unwrap();
    assert_eq!(c.mode(), EncoderMode::Rotor);
    assert_eq!(c.surface().pixels[SHIFT_KEY], Color::BLUE);
}

#[test]
fn test_send_failure_is_not_fatal() {
    let t0 = Instant::now();
    let mut c = make_controller(ProfileKind::EvmPlus, t0);
    c.transport_mut().fail = true;

    c.handle_event(InputEvent::KeyPressed(9), t0);
    assert_eq!(c.mode(), EncoderMode::Tempo);
    turn(&mut c, [0, 1, 2], t0);
    assert!(c.poll(t0 + ms(10)).is_ok());

    c.transport_mut().fail = false;
    c.handle_event(InputEvent::KeyPressed(1), t0 + ms(20));
    assert_eq!(c.transport_mut().drain(), pedal_pair(0x03));
}

#[test]
fn test_out_of_range_key_is_ignored() {
    let t0 = Instant::now();
    let mut c = make_controller(ProfileKind::EvmPlus, t0);
    c.handle_event(InputEvent::KeyPressed(12), t0);
    c.handle_event(InputEvent::KeyReleased(12), t0);
    assert!(c.transport_mut().drain().is_empty());
}

#[test]
fn test_flipped_orientation() {
    let t0 = Instant::now();
    let profile = DeviceProfile::for_kind(ProfileKind::EvmPlus);
    let mut settings = ControllerSettings::from_config(&AppConfig::default(), &profile);
    settings.orientation = Orientation::new(false);
    let mut c = Controller::new(profile, settings, RecordingTransport::new(), t0);

    // Physical 2 is logical 9 (Start/Stop)
    c.handle_event(InputEvent::KeyPressed(2), t0);
    assert_eq!(c.transport_mut().drain(), pedal_pair(0x12));
    assert_eq!(c.surface().pixels[2], Color::WHITE);
    // Logical shift key sits at physical 11 and shows Tempo
    assert_eq!(c.surface().pixels[11], Color::YELLOW);
}

#[test]
fn test_surface_shift_key_colors() {
    let t0 = Instant::now();
    let mut c = make_controller(ProfileKind::EvmPlus, t0);
    assert_eq!(c.surface().pixels[SHIFT_KEY], Color::BLUE);

    c.handle_event(InputEvent::EncoderSwitch, t0);
    c.handle_event(InputEvent::EncoderSwitch, t0);
    assert_eq!(c.surface().pixels[SHIFT_KEY], Color::PURPLE);

    lock_shift(&mut c, t0 + ms(10));
    assert_eq!(c.surface().pixels[SHIFT_KEY], Color::OFFWHITE);
    assert_eq!(c.surface().pixels[2], Color::YELLOW);
}

#[test]
fn test_key_flash_expires() {
    let t0 = Instant::now();
    let mut c = make_controller(ProfileKind::EvmPlus, t0);
    c.handle_event(InputEvent::KeyPressed(1), t0);
    assert_eq!(c.surface().pixels[1], Color::WHITE);

    c.poll(t0 + ms(200)).unwrap();
    assert_eq!(c.surface().pixels[1], Color::BLUE);
}

#[test]
fn test_quad_levels_follow_layer() {
    let t0 = Instant::now();
    let mut c = make_controller(ProfileKind::EvmPlus, t0);
    let board = VirtualQuadBoard::new();
    assert!(c.attach_quad_board(Box::new(board.clone()), t0));

    board.turn(0, 1);
    c.poll(t0 + Duration::from_secs(1)).unwrap();
    assert_eq!(
        c.transport_mut().drain(),
        vec![MidiMessage::ControlChange { channel: 15, cc: 0x6C, value: 104 }]
    );

    // Movement before a layer change is absorbed by the resync
    board.turn(1, 2);
    lock_shift(&mut c, t0 + Duration::from_secs(2));
    c.poll(t0 + Duration::from_secs(3)).unwrap();
    assert!(c.transport_mut().drain().is_empty());

    board.turn(0, -1);
    c.poll(t0 + Duration::from_secs(4)).unwrap();
    assert_eq!(
        c.transport_mut().drain(),
        vec![MidiMessage::ControlChange { channel: 15, cc: 0x67, value: 88 }]
    );
    assert_eq!(c.quad_level(0, Layer::Base), Some(104));
    assert_eq!(c.quad_level(0, Layer::Shift), Some(88));
}

#[test]
fn test_quad_switch_preset_fires_once() {
    let t0 = Instant::now();
    let mut c = make_controller(ProfileKind::EvmPlus, t0);
    let board = VirtualQuadBoard::new();
    c.attach_quad_board(Box::new(board.clone()), t0);

    // "All Vol 0"
    board.set_pressed(1, true);
    c.poll(t0 + ms(100)).unwrap();
    let sent = c.transport_mut().drain();
    assert_eq!(sent.len(), 5);
    assert!(sent
        .iter()
        .all(|m| matches!(m, MidiMessage::ControlChange { value: 0, .. })));
    for ch in 0..4 {
        assert_eq!(c.quad_level(ch, Layer::Base), Some(0));
        assert_eq!(c.quad_level(ch, Layer::Shift), Some(0));
    }

    // Still held, then quick re-press: suppressed
    c.poll(t0 + ms(200)).unwrap();
    board.set_pressed(1, false);
    c.poll(t0 + ms(300)).unwrap();
    board.set_pressed(1, true);
    c.poll(t0 + ms(400)).unwrap();
    assert!(c.transport_mut().drain().is_empty());

    board.set_pressed(1, false);
    c.poll(t0 + ms(500)).unwrap();
    board.set_pressed(1, true);
    c.poll(t0 + ms(1000)).unwrap();
    assert_eq!(c.transport_mut().drain().len(), 5);
}

#[test]
fn test_quad_partial_preset_updates_matching_shadows() {
    let t0 = Instant::now();
    let mut c = make_controller(ProfileKind::EvmPlus, t0);
    let board = VirtualQuadBoard::new();
    c.attach_quad_board(Box::new(board.clone()), t0);

    // "Lowers Vol 0" only touches the Lowers slider (base channel 0)
    board.set_pressed(3, true);
    c.poll(t0 + ms(100)).unwrap();
    assert_eq!(
        c.transport_mut().drain(),
        vec![MidiMessage::ControlChange { channel: 15, cc: 0x6C, value: 0 }]
    );
    assert_eq!(c.quad_level(0, Layer::Base), Some(0));
    assert_eq!(c.quad_level(1, Layer::Base), Some(96));
    assert_eq!(c.quad_level(0, Layer::Shift), Some(96));
}

#[test]
fn test_evm_quad_sends_efx_levels() {
    let t0 = Instant::now();
    let mut c = make_controller(ProfileKind::Evm, t0);
    let board = VirtualQuadBoard::new();
    c.attach_quad_board(Box::new(board.clone()), t0);

    board.turn(2, 1);
    c.poll(t0 + Duration::from_secs(1)).unwrap();
    assert_eq!(
        c.transport_mut().drain(),
        vec![protocol::ketron_efx_level(0x08, 104)]
    );
}

#[test]
fn test_absent_quad_board_degrades() {
    let t0 = Instant::now();
    let mut c = make_controller(ProfileKind::EvmPlus, t0);
    assert!(!c.attach_quad_board(Box::new(VirtualQuadBoard::absent()), t0));
    assert!(!c.quad_attached());
    assert!(c.poll(t0 + ms(10)).is_ok());
}

#[test]
fn test_keymap_vars_disable_quad() {
    let t0 = Instant::now();
    let mut c = make_controller(ProfileKind::EvmPlus, t0);
    let board = VirtualQuadBoard::new();
    c.attach_quad_board(Box::new(board.clone()), t0);

    c.load_keymap_text("var00=EncQuad:False\n", t0).unwrap();
    board.turn(0, 3);
    c.poll(t0 + ms(10)).unwrap();
    assert!(c.transport_mut().drain().is_empty());
}

#[test]
fn test_keymap_vars_change_step() {
    let t0 = Instant::now();
    let mut c = make_controller(ProfileKind::EvmPlus, t0);
    let board = VirtualQuadBoard::new();
    c.attach_quad_board(Box::new(board.clone()), t0);

    c.load_keymap_text("var00=EncStep:2\nvar01=EncFwd:False\n", t0).unwrap();
    board.turn(0, 1);
    c.poll(t0 + Duration::from_secs(1)).unwrap();
    assert_eq!(c.quad_level(0, Layer::Base), Some(94));
}

const BASE_LINES: &str = "\
key00=1:VARIATION:blue
key01=0:Arr.A:blue
key02=0:Intro/End1:green
key03=0:Fill:green
key04=0:Arr.B:blue
key05=0:Intro/End2:green
key06=0:Break:orange
key07=0:Arr.C:blue
key08=0:Intro/End3:green
key09=0:Start/Stop:red
key10=0:Arr.D:blue
key11=0:To End:red
";

#[test]
fn test_reload_starts_from_defaults() {
    let t0 = Instant::now();
    let mut c = make_controller(ProfileKind::EvmPlus, t0);

    let with_shift = format!("{}key12=0:Arr.Off:red\nmac00=SStop:[0:Start/Stop]\n", BASE_LINES);
    c.load_keymap_text(&with_shift, t0).unwrap();
    assert_eq!(c.cache().resolve_layer(0, Layer::Shift).name(), "Arr.Off");
    assert!(c.cache().macro_steps("PLUGGED").is_none());

    // Dropping the lines brings the built-in bindings back
    c.load_keymap_text(BASE_LINES, t0).unwrap();
    assert_eq!(c.cache().resolve_layer(0, Layer::Shift).name(), "VARIATION");
    assert!(c.cache().macro_steps("PLUGGED").is_some());

    let mut fresh = make_controller(ProfileKind::EvmPlus, t0);
    fresh.load_keymap_text(BASE_LINES, t0).unwrap();
    assert_eq!(c.cache().raw(), fresh.cache().raw());
}

#[test]
fn test_reload_resets_omitted_vars() {
    let t0 = Instant::now();
    let mut c = make_controller(ProfileKind::EvmPlus, t0);
    c.attach_quad_board(Box::new(VirtualQuadBoard::new()), t0);

    c.load_keymap_text("var00=EncStep:2\n", t0).unwrap();
    assert_eq!(c.quad.as_ref().map(|u| u.tracker.settings().step), Some(2));

    c.load_keymap_text("", t0).unwrap();
    assert_eq!(c.quad.as_ref().map(|u| u.tracker.settings().step), Some(8));
}

#[test]
fn test_quad_reenable_ignores_movement_while_disabled() {
    let t0 = Instant::now();
    let mut c = make_controller(ProfileKind::EvmPlus, t0);
    let board = VirtualQuadBoard::new();
    c.attach_quad_board(Box::new(board.clone()), t0);

    c.load_keymap_text("var00=EncQuad:False\n", t0).unwrap();
    board.turn(0, 5);
    c.poll(t0 + ms(10)).unwrap();

    c.load_keymap_text("var00=EncQuad:True\n", t0 + ms(20)).unwrap();
    c.poll(t0 + ms(30)).unwrap();
    assert!(c.transport_mut().drain().is_empty());
    assert_eq!(c.quad_level(0, Layer::Base), Some(96));

    // Movement after re-enabling is a normal tick
    board.turn(0, 1);
    c.poll(t0 + Duration::from_secs(1)).unwrap();
    assert_eq!(c.quad_level(0, Layer::Base), Some(104));
    assert_eq!(c.transport_mut().drain().len(), 1);
}

#[test]
fn test_quad_disabled_in_config_enabled_by_keymap() {
    let t0 = Instant::now();
    let profile = DeviceProfile::for_kind(ProfileKind::EvmPlus);
    let mut config = AppConfig::default();
    config.quad.enabled = false;
    let settings = ControllerSettings::from_config(&config, &profile);
    let mut c = Controller::new(profile, settings, RecordingTransport::new(), t0);

    let board = VirtualQuadBoard::new();
    assert!(c.attach_quad_board(Box::new(board.clone()), t0));
    board.turn(1, 2);
    c.poll(t0 + ms(10)).unwrap();
    assert!(c.transport_mut().drain().is_empty());

    c.load_keymap_text("var00=EncQuad:True\n", t0 + ms(20)).unwrap();
    board.turn(1, 1);
    c.poll(t0 + Duration::from_secs(1)).unwrap();
    assert_eq!(c.quad_level(1, Layer::Base), Some(104));
}

#[test]
fn test_detached_board_reports_error() {
    let t0 = Instant::now();
    let mut c = make_controller(ProfileKind::EvmPlus, t0);
    let board = VirtualQuadBoard::new();
    c.attach_quad_board(Box::new(board), t0);
    if let Some(unit) = &mut c.quad {
        unit.board = Box::new(VirtualQuadBoard::absent());
    }
    assert!(c.poll(t0 + ms(10)).is_err());
    // Encoder timeouts still run on the failing poll
    c.handle_event(InputEvent::EncoderSwitch, t0);
    assert!(c.poll(t0 + Duration::from_secs(61)).is_err());
    assert_eq!(c.mode(), EncoderMode::Rotor);
}

#[test]
fn test_genos_start_stop_and_tempo() {
    let t0 = Instant::now();
    let mut c = make_controller(ProfileKind::Genos, t0);
    assert_eq!(c.mode(), EncoderMode::Tempo);
    assert_eq!(c.tempo_bpm(), 90);

    c.handle_event(InputEvent::KeyPressed(9), t0);
    c.handle_event(InputEvent::KeyPressed(9), t0 + ms(100));
    assert_eq!(
        c.transport_mut().drain(),
        vec![protocol::yamaha_start_stop(true), protocol::yamaha_start_stop(false)]
    );

    // No shift layer: key 0 fires on press
    c.handle_event(InputEvent::KeyPressed(0), t0 + ms(200));
    assert_eq!(
        c.transport_mut().drain(),
        vec![protocol::yamaha_section(0x20, true), protocol::yamaha_section(0x20, false)]
    );

    turn(&mut c, [0, 1, 2, 1], t0 + ms(300));
    assert_eq!(
        c.transport_mut().drain(),
        vec![
            protocol::yamaha_tempo(91),
            protocol::yamaha_tempo(92),
            protocol::yamaha_tempo(91)
        ]
    );

    // Tap stays in Tempo, which never times out
    c.handle_event(InputEvent::EncoderSwitch, t0);
    c.poll(t0 + Duration::from_secs(3600)).unwrap();
    assert_eq!(c.mode(), EncoderMode::Tempo);
}

#[test]
fn test_test_tune_after_long_hold() {
    let t0 = Instant::now();
    let mut c = make_controller(ProfileKind::EvmPlus, t0);

    tap_key(&mut c, TUNE_KEY, t0, ms(1000));
    assert!(!c.tune_playing());

    tap_key(&mut c, TUNE_KEY, t0 + ms(2000), ms(2500));
    assert!(c.tune_playing());
    c.transport_mut().drain();

    c.poll(t0 + ms(4500)).unwrap();
    assert_eq!(
        c.transport_mut().drain(),
        vec![MidiMessage::NoteOn { channel: 15, note: 64, velocity: 120 }]
    );
}
