/// Display specifications
pub mod display {
    use crate::HardwareId;

    /// Name of the sprite used for every dot of the matrix
    pub const PIXEL_SPRITE: &str = "rsd_pixel";

    /// Status icon bound to one bit of the display buffer
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct IconBit {
        /// Sprite name in the model descriptor
        pub name: &'static str,
        /// Bit mask within the buffer byte
        pub mask: u8,
        /// Byte offset within the buffer (before display offset scrolling)
        pub offset: u16,
    }

    const fn icon(name: &'static str, mask: u8, offset: u16) -> IconBit {
        IconBit { name, mask, offset }
    }

    /// Writable bits of the display registers.
    ///
    /// `None` means the register does not exist on the variant.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RegisterMasks {
        pub range: u8,
        pub mode: u8,
        pub contrast: u8,
        pub refresh_rate: u8,
        pub brightness: Option<u8>,
        pub contrast2: Option<u8>,
        pub contrast2_en: Option<u8>,
        pub select: Option<u8>,
        pub offset: Option<u8>,
    }

    /// Geometry and behaviour of a buffer-based dot matrix display
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct MatrixSpec {
        /// Buffer rows including the status icon row
        pub rows: usize,
        /// Bytes per buffer row
        pub row_size: usize,
        /// Bytes per row that reach the glass
        pub visible_row_bytes: usize,
        /// Per-tick decay ratio
        pub decay_ratio: f32,
        /// Contrast gain of the ink model
        pub ink_coeff: i32,
        /// Constant offset of the ink model
        pub ink_base: i32,
        /// Second buffer blended in at 80 % (first buffer contributes 20 %)
        pub dual_buffer: bool,
        /// Mode bits 3/4 mirror the cell mapping
        pub mirroring: bool,
        /// Toggling mode bit 3 bit-reverses and mirrors the stored buffers
        pub flip_reverses_buffer: bool,
        /// Row index that vertical mirroring reflects around
        pub vflip_base: usize,
        /// Display is gated by the power register at 0xF03D
        pub power_register: bool,
        /// 0xF03E/0xF03F mirror their writes to another SFR
        pub forward_registers: bool,
        /// Refresh rate register feeds the scan-line model
        pub refresh_drives_scan: bool,
        /// Byte range `(offset, len)` of the buffer window taken by other
        /// registers; the buffer region is split around it
        pub buffer_hole: Option<(usize, usize)>,
        /// Fixed contrast2 / contrast2-enable values when the registers are absent
        pub fixed_contrast2: Option<(u8, u8)>,
        pub masks: RegisterMasks,
        pub icons: &'static [IconBit],
    }

    impl MatrixSpec {
        /// Buffer length in bytes
        pub const fn buffer_len(&self) -> usize {
            self.rows * self.row_size
        }

        /// Dot columns per row
        pub const fn columns(&self) -> usize {
            self.visible_row_bytes * 8
        }
    }

    /// Command-port display with a column-major 1 bpp scan map in RAM
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct CommandPortSpec {
        pub columns: usize,
        pub rows: usize,
        pub decay_ratio: f32,
        pub icons: &'static [IconBit],
    }

    impl CommandPortSpec {
        /// Bytes of packed scan data
        pub const fn scan_len(&self) -> usize {
            self.columns * self.rows / 8
        }
    }

    /// Display flavour of a variant
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub enum DisplaySpec {
        Matrix(&'static MatrixSpec),
        CommandPort(&'static CommandPortSpec),
    }

    pub fn display_spec(hw: HardwareId) -> DisplaySpec {
        match hw {
            HardwareId::EsPlus | HardwareId::Fx5800P => DisplaySpec::Matrix(&ES_PLUS),
            HardwareId::ClassWiz => DisplaySpec::Matrix(&CLASSWIZ),
            HardwareId::ClassWizII => DisplaySpec::Matrix(&CLASSWIZ_II),
            HardwareId::Ti => DisplaySpec::CommandPort(&TI),
        }
    }

    const ES_PLUS_ICONS: [IconBit; 18] = [
        icon("rsd_s", 0x10, 0x00),
        icon("rsd_a", 0x04, 0x00),
        icon("rsd_m", 0x10, 0x01),
        icon("rsd_sto", 0x02, 0x01),
        icon("rsd_rcl", 0x40, 0x02),
        icon("rsd_stat", 0x40, 0x03),
        icon("rsd_cmplx", 0x80, 0x04),
        icon("rsd_mat", 0x40, 0x05),
        icon("rsd_vct", 0x01, 0x05),
        icon("rsd_d", 0x20, 0x07),
        icon("rsd_r", 0x02, 0x07),
        icon("rsd_g", 0x10, 0x08),
        icon("rsd_fix", 0x01, 0x08),
        icon("rsd_sci", 0x20, 0x09),
        icon("rsd_math", 0x40, 0x0A),
        icon("rsd_down", 0x08, 0x0A),
        icon("rsd_up", 0x80, 0x0B),
        icon("rsd_disp", 0x10, 0x0B),
    ];

    const CLASSWIZ_ICONS: [IconBit; 20] = [
        icon("rsd_s", 0x01, 0x00),
        icon("rsd_a", 0x01, 0x01),
        icon("rsd_m", 0x01, 0x02),
        icon("rsd_sto", 0x01, 0x03),
        icon("rsd_math", 0x01, 0x05),
        icon("rsd_d", 0x01, 0x06),
        icon("rsd_r", 0x01, 0x07),
        icon("rsd_g", 0x01, 0x08),
        icon("rsd_fix", 0x01, 0x09),
        icon("rsd_sci", 0x01, 0x0A),
        icon("rsd_e", 0x01, 0x0B),
        icon("rsd_cmplx", 0x01, 0x0C),
        icon("rsd_angle", 0x01, 0x0D),
        icon("rsd_wdown", 0x01, 0x0F),
        icon("rsd_left", 0x01, 0x10),
        icon("rsd_down", 0x01, 0x11),
        icon("rsd_up", 0x01, 0x12),
        icon("rsd_right", 0x01, 0x13),
        icon("rsd_pause", 0x01, 0x15),
        icon("rsd_sun", 0x01, 0x16),
    ];

    const CLASSWIZ_II_ICONS: [IconBit; 18] = [
        icon("rsd_s", 0x01, 0x01),
        icon("rsd_math", 0x01, 0x03),
        icon("rsd_d", 0x01, 0x04),
        icon("rsd_r", 0x01, 0x05),
        icon("rsd_g", 0x01, 0x06),
        icon("rsd_fix", 0x01, 0x07),
        icon("rsd_sci", 0x01, 0x08),
        icon("rsd_e", 0x01, 0x0A),
        icon("rsd_cmplx", 0x01, 0x0B),
        icon("rsd_angle", 0x01, 0x0C),
        icon("rsd_wdown", 0x01, 0x0D),
        icon("rsd_verify", 0x01, 0x0E),
        icon("rsd_left", 0x01, 0x10),
        icon("rsd_down", 0x01, 0x11),
        icon("rsd_up", 0x01, 0x12),
        icon("rsd_right", 0x01, 0x13),
        icon("rsd_pause", 0x01, 0x15),
        icon("rsd_sun", 0x01, 0x16),
    ];

    /// Port external interrupt banks (0xF980-0xF9C7) inside the 0xF800 buffer
    const PORT_INTERRUPT_WINDOW: (usize, usize) = (0x180, 0x48);

    const TI_ICONS: [IconBit; 1] = [icon("rsd_2nd", 0x02, 0x00)];

    pub static ES_PLUS: MatrixSpec = MatrixSpec {
        rows: 32,
        row_size: 16,
        visible_row_bytes: 12,
        decay_ratio: 1.0 - 1e-4,
        ink_coeff: 28,
        ink_base: -240,
        dual_buffer: false,
        mirroring: false,
        flip_reverses_buffer: false,
        vflip_base: 32,
        power_register: false,
        forward_registers: false,
        refresh_drives_scan: false,
        buffer_hole: None,
        fixed_contrast2: Some((0x17, 1)),
        masks: RegisterMasks {
            range: 0x07,
            mode: 0x07,
            contrast: 0x1F,
            refresh_rate: 0b11,
            brightness: None,
            contrast2: None,
            contrast2_en: None,
            select: None,
            offset: None,
        },
        icons: &ES_PLUS_ICONS,
    };

    pub static CLASSWIZ: MatrixSpec = MatrixSpec {
        rows: 64,
        row_size: 32,
        visible_row_bytes: 24,
        decay_ratio: 1.0 - 5e-4,
        ink_coeff: 28,
        ink_base: -240,
        dual_buffer: false,
        mirroring: true,
        flip_reverses_buffer: false,
        vflip_base: 64,
        power_register: true,
        forward_registers: true,
        refresh_drives_scan: true,
        buffer_hole: Some(PORT_INTERRUPT_WINDOW),
        fixed_contrast2: None,
        masks: RegisterMasks {
            range: 0x2F,
            mode: 0x3F,
            contrast: 0x3F,
            refresh_rate: 0x7F,
            brightness: Some(0x07),
            contrast2: Some(0x1F),
            contrast2_en: Some(0b1001),
            select: Some(0x05),
            offset: Some(0x3F),
        },
        icons: &CLASSWIZ_ICONS,
    };

    pub static CLASSWIZ_II: MatrixSpec = MatrixSpec {
        rows: 64,
        row_size: 32,
        visible_row_bytes: 24,
        decay_ratio: 1.0 - 5e-4,
        ink_coeff: 16,
        ink_base: 0,
        dual_buffer: true,
        mirroring: true,
        flip_reverses_buffer: true,
        vflip_base: 63,
        power_register: true,
        forward_registers: true,
        refresh_drives_scan: true,
        buffer_hole: Some(PORT_INTERRUPT_WINDOW),
        fixed_contrast2: None,
        masks: RegisterMasks {
            range: 0x2F,
            mode: 0x7F,
            contrast: 0x3F,
            refresh_rate: 0x7F,
            brightness: Some(0x07),
            contrast2: Some(0x1F),
            contrast2_en: Some(0b1001),
            select: Some(0x05),
            offset: Some(0x3F),
        },
        icons: &CLASSWIZ_II_ICONS,
    };

    pub static TI: CommandPortSpec = CommandPortSpec {
        columns: 192,
        rows: 64,
        decay_ratio: 1.0 - 1e-4,
        icons: &TI_ICONS,
    };
}

/// Timing of the host-side cadences
pub mod timing {
    /// Default interval between two decay ticks in microseconds
    pub const DECAY_TICK_INTERVAL_US: u64 = 50;

    /// Host frame interval in milliseconds
    pub const FRAME_INTERVAL_MS: u64 = 24;

    /// Refresh rate register values below this disable the scan-line model
    pub const FLICKER_THRESHOLD: f32 = 20.0;

    /// Peak brightness multiplier of the scan-line profile
    pub const SCAN_BRIGHTNESS_COEFF: f32 = 1.25;
}
