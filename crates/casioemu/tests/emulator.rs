use casioemu::mmio::battery_ram::RamImage;
use casioemu::mmio::{BatteryRam, Peripherals};
use casioemu::mmu::RegionBinder;
use casioemu::{EmulatorConfig, EmulatorCore, Mmu, ModelInfo, ScanSource};
use casioemu_hw::HardwareId;
use casioemu_hw::memory_map::{ADDRESS_SPACE, RamLayout};
use casioemu_hw::mmio::screen::{BUFFER_BASE, command_port, registers};
use casioemu_hw::specs::display::PIXEL_SPRITE;
use std::path::PathBuf;

fn config(seed: u64) -> EmulatorConfig {
    EmulatorConfig {
        seed: Some(seed),
        background_decay: false,
        ..EmulatorConfig::default()
    }
}

fn emulator(hw: HardwareId) -> EmulatorCore {
    EmulatorCore::new(ModelInfo::builtin(hw), config(7)).unwrap()
}

fn scratch_file(name: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("casioemu-{}-{}.bin", std::process::id(), name));
    let _ = std::fs::remove_file(&path);
    path
}

#[test]
fn classwiz_registers_appear_with_power() {
    let mut emu = emulator(HardwareId::ClassWiz);
    // Unpowered controller does not decode its registers
    emu.write(registers::RANGE, 0xFF);
    assert_eq!(emu.read(registers::RANGE), 0x00);

    emu.write(registers::POWER, 0x01);
    emu.write(registers::RANGE, 0xFF);
    assert_eq!(emu.read(registers::RANGE), 0x2F);
    emu.write(registers::RANGE, 0x00);
    assert_eq!(emu.read(registers::RANGE), 0x00);
    assert_eq!(emu.read(registers::POWER), 0x01);
}

#[test]
fn es_plus_controller_is_always_on() {
    let mut emu = emulator(HardwareId::EsPlus);
    emu.write(registers::RANGE, 0xFF);
    assert_eq!(emu.read(registers::RANGE), 0x07);
    emu.write(registers::CONTRAST, 0xFF);
    assert_eq!(emu.read(registers::CONTRAST), 0x1F);
}

#[test]
fn power_cycle_resets_registers_and_buffer() {
    let mut emu = emulator(HardwareId::ClassWiz);
    emu.write(registers::POWER, 0x01);
    emu.write(registers::CONTRAST, 0x20);
    for i in 0..24 {
        emu.write(BUFFER_BASE + i, 0x00);
    }

    emu.write(registers::POWER, 0x00);
    assert_eq!(emu.read(registers::CONTRAST), 0x00);
    assert_eq!(emu.read(BUFFER_BASE), 0x00);

    emu.write(registers::POWER, 0x01);
    assert_eq!(emu.read(registers::CONTRAST), 0x00);
    // The blanked row came back as noise
    let row = &emu.screen_buffers()[0][..24];
    assert!(row.iter().any(|&b| b != 0));
}

#[test]
fn flipping_twice_restores_the_buffer() {
    let mut emu = emulator(HardwareId::ClassWizII);
    emu.write(registers::POWER, 0x01);
    for i in 0..24 {
        emu.write(BUFFER_BASE + i, i as u8 + 1);
    }
    let before = emu.screen_buffers();

    emu.write(registers::MODE, 0x08);
    assert_ne!(emu.screen_buffers(), before);
    // Same flip bit again does not mirror
    emu.write(registers::MODE, 0x0D);
    emu.write(registers::MODE, 0x05);
    assert_eq!(emu.screen_buffers(), before);
}

#[test]
fn port_interrupts_survive_the_display_buffer() {
    let mut emu = emulator(HardwareId::ClassWiz);
    emu.write(registers::POWER, 0x01);

    // Port 0 Enable, Status and Clear sit inside the buffer's address window
    emu.write(0xF984, 0x01);
    assert_eq!(emu.raise_port_interrupt(0, 0x03), 0x01);
    assert!(emu.port_interrupt_pending(0));
    assert_eq!(emu.read(0xF985), 0x01);

    emu.write(0xF986, 0x01);
    assert!(!emu.port_interrupt_pending(0));
    assert_eq!(emu.screen_buffers()[0][0x184], {
        let mut fresh = emulator(HardwareId::ClassWiz);
        fresh.write(registers::POWER, 0x01);
        fresh.screen_buffers()[0][0x184]
    });
}

#[test]
fn seeded_runs_are_identical() {
    let a = emulator(HardwareId::ClassWizII);
    let b = emulator(HardwareId::ClassWizII);
    assert_eq!(a.ram(), b.ram());
    assert_eq!(a.screen_buffers(), b.screen_buffers());

    let c = EmulatorCore::new(ModelInfo::builtin(HardwareId::ClassWizII), config(8)).unwrap();
    assert_ne!(a.ram(), c.ram());
}

#[test]
fn ram_image_round_trips_through_shutdown() {
    let path = scratch_file("round-trip");
    let with_image = EmulatorConfig {
        ram_file: Some(path.clone()),
        ..config(1)
    };

    let mut emu = EmulatorCore::new(ModelInfo::builtin(HardwareId::ClassWiz), with_image.clone())
        .unwrap();
    let base = emu.ram_base();
    emu.write(base, 0x42);
    emu.write(base + 0x1FFF, 0x24);
    emu.shutdown();
    assert!(!emu.is_running());
    assert_eq!(std::fs::metadata(&path).unwrap().len(), 0x2100);

    let mut emu = EmulatorCore::new(
        ModelInfo::builtin(HardwareId::ClassWiz),
        EmulatorConfig {
            seed: Some(2),
            ..with_image
        },
    )
    .unwrap();
    assert_eq!(emu.read(base), 0x42);
    assert_eq!(emu.read(base + 0x1FFF), 0x24);
    drop(emu);
    let _ = std::fs::remove_file(&path);
}

#[test]
fn short_ram_image_keeps_noise_past_its_end() {
    let path = scratch_file("short");
    std::fs::write(&path, [1, 2, 3]).unwrap();

    let emu = EmulatorCore::new(
        ModelInfo::builtin(HardwareId::EsPlus),
        EmulatorConfig {
            ram_file: Some(path.clone()),
            preserve_ram: true,
            ..config(3)
        },
    )
    .unwrap();
    let clean = EmulatorCore::new(ModelInfo::builtin(HardwareId::EsPlus), config(3)).unwrap();

    assert_eq!(&emu.ram()[..3], &[1, 2, 3]);
    assert_eq!(&emu.ram()[3..], &clean.ram()[3..]);
    drop(emu);
    // Preserved image is not rewritten
    assert_eq!(std::fs::read(&path).unwrap(), vec![1, 2, 3]);
    let _ = std::fs::remove_file(&path);
}

#[test]
fn clean_ram_ignores_the_image() {
    let path = scratch_file("clean");
    std::fs::write(&path, [0xAA; 16]).unwrap();
    let emu = EmulatorCore::new(
        ModelInfo::builtin(HardwareId::EsPlus),
        EmulatorConfig {
            ram_file: Some(path.clone()),
            clean_ram: true,
            preserve_ram: true,
            ..config(4)
        },
    )
    .unwrap();
    let clean = EmulatorCore::new(ModelInfo::builtin(HardwareId::EsPlus), config(4)).unwrap();
    assert_eq!(emu.ram(), clean.ram());
    let _ = std::fs::remove_file(&path);
}

#[test]
fn ti_display_draws_the_scan_map() {
    let mut emu = emulator(HardwareId::Ti);
    let source = ScanSource {
        screen_addr: 0xD000,
        status_addr: 0xD600,
    };
    assert!(emu.set_scan_source(Some(source)));
    for i in 0..0x601 {
        emu.write(0xD000 + i, 0x00);
    }
    // Column 0, rows 0-7
    emu.write(0xD000, 0xFF);

    emu.write(command_port::COMMAND, command_port::CMD_ENABLE);
    emu.write(command_port::COMMAND, command_port::CMD_SET_CONTRAST);
    emu.write(command_port::COMMAND, 0x70);

    emu.frame();
    for _ in 0..8_000 {
        emu.tick();
    }
    let lit = emu
        .frame()
        .into_iter()
        .filter(|call| call.sprite == PIXEL_SPRITE && call.alpha > 100)
        .count();
    assert_eq!(lit, 8);
}

#[test]
fn matrix_displays_reject_scan_sources() {
    let mut emu = emulator(HardwareId::ClassWiz);
    assert!(!emu.set_scan_source(None));
    assert_eq!(emu.display_geometry(), (64, 192));
}

#[test]
fn shutdown_unmaps_everything() {
    let mut emu = emulator(HardwareId::ClassWiz);
    emu.write(registers::POWER, 0x01);
    emu.shutdown();
    assert!(emu.regions().all(|r| !r.is_active()));
    emu.shutdown();
}

#[test]
fn cursor_highlight_follows_the_ram_byte() {
    let mut model = ModelInfo::builtin(HardwareId::ClassWiz);
    assert!(EmulatorCore::new(model.clone(), config(5)).unwrap().cursor_highlight().is_none());

    model.cursor_offset = Some(0xD200);
    model.input_area_offset = Some(0xD280);
    let mut emu = EmulatorCore::new(model, config(5)).unwrap();
    emu.write(0xD200, 0x03);
    assert_eq!(emu.cursor_highlight(), Some(0xD283));
}

#[test]
fn cursor_past_the_address_space_is_ignored() {
    let mut model = ModelInfo::builtin(HardwareId::ClassWiz);
    model.cursor_offset = Some(0xD200);
    model.input_area_offset = Some(u32::MAX);
    let mut emu = EmulatorCore::new(model, config(5)).unwrap();
    emu.write(0xD200, 0x00);
    assert_eq!(emu.cursor_highlight(), Some(u32::MAX));
    emu.write(0xD200, 0x01);
    assert_eq!(emu.cursor_highlight(), None);
}

#[test]
fn large_unseeded_ram_reads_back_stably() {
    let layout = RamLayout {
        base: 0x1_0000,
        size: 0x1_0000,
        alias_base: 0x3_0000,
    };
    let mut mmu = Mmu::new(ADDRESS_SPACE);
    let mut peripherals = Peripherals::new();
    let id = peripherals.add(Box::new(BatteryRam::new(
        layout,
        false,
        false,
        RamImage::default(),
        None,
    )));
    peripherals
        .get_mut(id)
        .initialise(&mut RegionBinder::new(&mut mmu, id))
        .unwrap();
    assert_eq!(peripherals.get(id).as_ram().unwrap().bytes().len(), 0x10100);

    let mut read_all = |mmu: &mut Mmu| {
        let mut bytes = Vec::with_capacity(0x10100);
        for i in 0..0x1_0000 {
            bytes.push(mmu.read(&mut peripherals, layout.base + i));
        }
        for i in 0..0x100 {
            bytes.push(mmu.read(&mut peripherals, layout.alias_base + i));
        }
        bytes
    };
    let first = read_all(&mut mmu);
    let second = read_all(&mut mmu);
    assert_eq!(first.len(), 0x10100);
    assert_eq!(first, second);

    let bytes = peripherals.get(id).as_ram().unwrap().bytes();
    assert_eq!(first, bytes);
    // The trailer sits past the main window and only answers at the alias
    assert!(mmu.resolve(layout.base + 0x1_0000).is_none());
    assert_eq!(mmu.resolve(layout.alias_base + 0xFF).unwrap().label, "BatteryBackedRAM/2");
}
