/// Maps a General MIDI program number to a display name.
pub trait InstrumentNames {
    fn instrument_name(&self, program: u8) -> String;
}

impl<F> InstrumentNames for F
where
    F: Fn(u8) -> String,
{
    fn instrument_name(&self, program: u8) -> String {
        self(program)
    }
}
