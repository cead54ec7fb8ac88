
// Rigol DS1000-series oscilloscopes (DS1052E, DS1102E and relatives)
pub mod ds1000;
