/// Effects a cartridge can have on the outside world.
///
/// The VM calls these from `SYS` instructions, synchronously and in
/// instruction order. Arguments have already been checked (or coerced, when
/// checking is off): colors are palette indices, buttons are in range.
pub trait Host {
    fn pset(&mut self, x: f64, y: f64, color: u8);
    fn spr(&mut self, sprite: f64, x: f64, y: f64);
    fn btn(&mut self, button: u8) -> bool;
    fn cls(&mut self);
    fn print(&mut self, text: &str, x: f64, y: f64, color: u8, small: bool);
    fn sfx(&mut self, id: f64);
    fn log(&mut self, message: &str);
}

/// A host with no effects; `btn` is never pressed.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullHost;

impl Host for NullHost {
    fn pset(&mut self, _x: f64, _y: f64, _color: u8) {}
    fn spr(&mut self, _sprite: f64, _x: f64, _y: f64) {}
    fn btn(&mut self, _button: u8) -> bool {
        false
    }
    fn cls(&mut self) {}
    fn print(&mut self, _text: &str, _x: f64, _y: f64, _color: u8, _small: bool) {}
    fn sfx(&mut self, _id: f64) {}
    fn log(&mut self, message: &str) {
        log::info!(target: "cart", "{}", message);
    }
}
