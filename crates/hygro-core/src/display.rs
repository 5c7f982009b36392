//! Character display contract and a 16x2 cell model.
//!
//! [`CharacterDisplay`] is what the monitor writes to: pre-formatted strings at
//! a column on one of two lines, HD44780 style. [`LcdBuffer`] keeps the cell
//! contents and which lines changed; [`GraphicsLcd`] draws that model on any
//! `embedded-graphics` target.

use core::convert::Infallible;
use core::fmt::Debug;

use embedded_graphics::mono_font::{MonoFont, MonoTextStyle, ascii::FONT_10X20};
use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{PrimitiveStyle, Rectangle};
use embedded_graphics::text::{Baseline, Text};

pub const LCD_COLUMNS: usize = 16;
pub const LCD_LINES: usize = 2;

const BLANK: u8 = b' ';
const UNPRINTABLE: u8 = b'?';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LcdLine {
    One,
    Two,
}

impl LcdLine {
    pub const ALL: [LcdLine; LCD_LINES] = [LcdLine::One, LcdLine::Two];

    const fn index(self) -> usize {
        match self {
            LcdLine::One => 0,
            LcdLine::Two => 1,
        }
    }
}

/// A display that accepts already formatted text.
pub trait CharacterDisplay {
    type Error: Debug;

    /// Write `text` starting at column `position` of `line`.
    fn display_message(&mut self, position: u8, line: LcdLine, text: &str) -> Result<(), Self::Error>;

    /// Write `label` at `position`, immediately followed by `value`.
    fn display_two_fields(
        &mut self,
        position: u8,
        line: LcdLine,
        label: &str,
        value: &str,
    ) -> Result<(), Self::Error> {
        self.display_message(position, line, label)?;
        let offset = u8::try_from(label.len()).unwrap_or(u8::MAX);
        self.display_message(position.saturating_add(offset), line, value)
    }
}

/// Cell contents of a 16x2 character LCD.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LcdBuffer {
    cells: [[u8; LCD_COLUMNS]; LCD_LINES],
    dirty: [bool; LCD_LINES],
}

impl Default for LcdBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl LcdBuffer {
    pub const fn new() -> Self {
        Self {
            cells: [[BLANK; LCD_COLUMNS]; LCD_LINES],
            dirty: [true; LCD_LINES],
        }
    }

    /// Write `text` from column `position`, clipping at the right edge.
    /// Returns how many cells were written.
    pub fn write(&mut self, position: u8, line: LcdLine, text: &str) -> usize {
        let row = &mut self.cells[line.index()];
        let start = usize::from(position);
        let mut written = 0;

        for (cell, ch) in row.iter_mut().skip(start).zip(text.chars()) {
            let byte = if ch.is_ascii() && !ch.is_ascii_control() {
                ch as u8
            } else {
                UNPRINTABLE
            };
            if *cell != byte {
                *cell = byte;
                self.dirty[line.index()] = true;
            }
            written += 1;
        }
        written
    }

    pub fn line_text(&self, line: LcdLine) -> &str {
        // cells only ever hold printable ASCII
        core::str::from_utf8(&self.cells[line.index()]).unwrap_or_default()
    }

    pub fn is_dirty(&self, line: LcdLine) -> bool {
        self.dirty[line.index()]
    }

    /// Report and clear the line's dirty flag.
    pub fn take_dirty(&mut self, line: LcdLine) -> bool {
        core::mem::replace(&mut self.dirty[line.index()], false)
    }

    pub fn clear(&mut self) {
        self.cells = [[BLANK; LCD_COLUMNS]; LCD_LINES];
        self.dirty = [true; LCD_LINES];
    }
}

impl CharacterDisplay for LcdBuffer {
    type Error = Infallible;

    fn display_message(&mut self, position: u8, line: LcdLine, text: &str) -> Result<(), Self::Error> {
        self.write(position, line, text);
        Ok(())
    }
}

/// A character LCD rendered on a pixel display.
///
/// Each cell is one glyph of a monospace font; only lines whose cells changed
/// are repainted.
pub struct GraphicsLcd<D> {
    target: D,
    buffer: LcdBuffer,
    origin: Point,
    font: &'static MonoFont<'static>,
    foreground: Rgb565,
    background: Rgb565,
}

impl<D> GraphicsLcd<D>
where
    D: DrawTarget<Color = Rgb565>,
{
    /// Vertical gap between the two text rows, in pixels.
    const LINE_GAP: u32 = 4;

    pub fn new(target: D, origin: Point) -> Self {
        Self {
            target,
            buffer: LcdBuffer::new(),
            origin,
            font: &FONT_10X20,
            foreground: Rgb565::WHITE,
            background: Rgb565::BLACK,
        }
    }

    pub fn with_colors(mut self, foreground: Rgb565, background: Rgb565) -> Self {
        self.foreground = foreground;
        self.background = background;
        self
    }

    pub fn buffer(&self) -> &LcdBuffer {
        &self.buffer
    }

    /// The pixel display being drawn on.
    pub fn target(&self) -> &D {
        &self.target
    }

    /// Area covered by one text row.
    pub fn line_bounds(&self, line: LcdLine) -> Rectangle {
        let cell = self.font.character_size;
        let pitch = cell.height + Self::LINE_GAP;
        let top_left = self.origin + Point::new(0, (pitch as usize * line.index()) as i32);
        Rectangle::new(top_left, Size::new(cell.width * LCD_COLUMNS as u32, cell.height))
    }

    /// Repaint every line changed since the last redraw.
    pub fn redraw(&mut self) -> Result<(), D::Error> {
        for line in LcdLine::ALL {
            if !self.buffer.take_dirty(line) {
                continue;
            }
            let bounds = self.line_bounds(line);
            bounds
                .into_styled(PrimitiveStyle::with_fill(self.background))
                .draw(&mut self.target)?;

            let style = MonoTextStyle::new(self.font, self.foreground);
            Text::with_baseline(self.buffer.line_text(line), bounds.top_left, style, Baseline::Top)
                .draw(&mut self.target)?;
        }
        Ok(())
    }

    pub fn release(self) -> D {
        self.target
    }
}

impl<D> CharacterDisplay for GraphicsLcd<D>
where
    D: DrawTarget<Color = Rgb565>,
    D::Error: Debug,
{
    type Error = D::Error;

    fn display_message(&mut self, position: u8, line: LcdLine, text: &str) -> Result<(), Self::Error> {
        self.buffer.write(position, line, text);
        self.redraw()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_buffer_is_blank_and_dirty() {
        let lcd = LcdBuffer::new();
        assert_eq!(lcd.line_text(LcdLine::One), "                ");
        assert!(lcd.is_dirty(LcdLine::One));
        assert!(lcd.is_dirty(LcdLine::Two));
    }

    #[test]
    fn two_fields_are_adjacent() {
        let mut lcd = LcdBuffer::new();
        lcd.display_two_fields(9, LcdLine::One, "H:", "39.47").unwrap();

        assert_eq!(lcd.line_text(LcdLine::One), "         H:39.47");
        assert_eq!(lcd.line_text(LcdLine::Two), "                ");
    }

    #[test]
    fn text_is_clipped_at_the_right_edge() {
        let mut lcd = LcdBuffer::new();
        assert_eq!(lcd.write(12, LcdLine::Two, "123456"), 4);
        assert_eq!(lcd.line_text(LcdLine::Two), "            1234");

        assert_eq!(lcd.write(16, LcdLine::Two, "x"), 0);
        assert_eq!(lcd.write(u8::MAX, LcdLine::Two, "x"), 0);
    }

    #[test]
    fn non_ascii_becomes_question_mark() {
        let mut lcd = LcdBuffer::new();
        lcd.write(0, LcdLine::One, "25.0°C\n");
        assert_eq!(lcd.line_text(LcdLine::One), "25.0?C?         ");
    }

    #[test]
    fn dirty_tracking_ignores_identical_writes() {
        let mut lcd = LcdBuffer::new();
        lcd.write(0, LcdLine::One, "01:20:00");
        assert!(lcd.take_dirty(LcdLine::One));
        assert!(!lcd.take_dirty(LcdLine::One));

        lcd.write(0, LcdLine::One, "01:20:00");
        assert!(!lcd.is_dirty(LcdLine::One));

        lcd.write(0, LcdLine::One, "01:20:01");
        assert!(lcd.is_dirty(LcdLine::One));
        assert!(lcd.is_dirty(LcdLine::Two));
    }

    /// Counts pixels and remembers the drawn extent.
    struct PixelCounter {
        pixels: usize,
        lowest_row: i32,
    }

    impl OriginDimensions for PixelCounter {
        fn size(&self) -> Size {
            Size::new(320, 240)
        }
    }

    impl DrawTarget for PixelCounter {
        type Color = Rgb565;
        type Error = Infallible;

        fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
        where
            I: IntoIterator<Item = Pixel<Self::Color>>,
        {
            for Pixel(point, _) in pixels {
                self.pixels += 1;
                self.lowest_row = self.lowest_row.max(point.y);
            }
            Ok(())
        }
    }

    #[test]
    fn graphics_lcd_repaints_only_dirty_lines() {
        let target = PixelCounter { pixels: 0, lowest_row: 0 };
        let mut lcd = GraphicsLcd::new(target, Point::new(0, 0));

        lcd.display_message(0, LcdLine::One, "01:20:00").unwrap();
        let after_first = lcd.target.pixels;
        // both lines were dirty initially: two 160x20 fills plus glyphs
        assert!(after_first >= 2 * 160 * 20);
        assert!(lcd.target.lowest_row >= 24);

        lcd.display_message(0, LcdLine::One, "01:20:00").unwrap();
        assert_eq!(lcd.target.pixels, after_first);

        lcd.display_message(0, LcdLine::One, "01:20:01").unwrap();
        let delta = lcd.target.pixels - after_first;
        assert!(delta >= 160 * 20);
        assert!(delta < 2 * 160 * 20);
    }

    #[test]
    fn line_bounds_stack_vertically() {
        let lcd = GraphicsLcd::new(PixelCounter { pixels: 0, lowest_row: 0 }, Point::new(8, 10));

        assert_eq!(lcd.line_bounds(LcdLine::One), Rectangle::new(Point::new(8, 10), Size::new(160, 20)));
        assert_eq!(lcd.line_bounds(LcdLine::Two), Rectangle::new(Point::new(8, 34), Size::new(160, 20)));
    }
}
