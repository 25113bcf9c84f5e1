use image::Rgb;

/// Colors shared by every chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChartTheme {
    pub background: Rgb<u8>,
    pub text: Rgb<u8>,
    pub border: Rgb<u8>,
    pub legend_background: Rgb<u8>,
    pub blue: Rgb<u8>,
    pub coral: Rgb<u8>,
    pub green: Rgb<u8>,
    pub purple: Rgb<u8>,
}

impl ChartTheme {
    pub const DARK: ChartTheme = ChartTheme {
        background: hex(0x1E1E2E),
        text: hex(0xE0E0E0),
        border: hex(0x444455),
        legend_background: hex(0x2A2A3E),
        blue: hex(0x4A90D9),
        coral: hex(0xE07B6A),
        green: hex(0x5BAD6F),
        purple: hex(0x9B6BC9),
    };
}

const fn hex(rgb: u32) -> Rgb<u8> {
    Rgb([(rgb >> 16) as u8, (rgb >> 8) as u8, rgb as u8])
}
