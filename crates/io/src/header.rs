//! The global file header.

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use retin_geometry::{Coord, Elev};

/// Global metadata of a finished TIN file. Written provisionally before the
/// first tile with zero totals, then rewritten in place once every tile has
/// been counted.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TinHeader {
    pub ncols: Coord,
    pub nrows: Coord,
    pub xllcorner: f64,
    pub yllcorner: f64,
    pub cellsize: f64,
    pub num_tiles: u32,
    pub num_triangles: u32,
    pub num_points: u32,
    pub tile_len: u32,
    pub min: Elev,
    pub max: Elev,
    pub nodata: Elev,
}

impl TinHeader {
    pub fn write_to<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        w.write_i16::<LittleEndian>(self.ncols)?;
        w.write_i16::<LittleEndian>(self.nrows)?;
        w.write_f64::<LittleEndian>(self.xllcorner)?;
        w.write_f64::<LittleEndian>(self.yllcorner)?;
        w.write_f64::<LittleEndian>(self.cellsize)?;
        w.write_u32::<LittleEndian>(self.num_tiles)?;
        w.write_u32::<LittleEndian>(self.num_triangles)?;
        w.write_u32::<LittleEndian>(self.num_points)?;
        w.write_u32::<LittleEndian>(self.tile_len)?;
        w.write_i16::<LittleEndian>(self.min)?;
        w.write_i16::<LittleEndian>(self.max)?;
        w.write_i16::<LittleEndian>(self.nodata)?;
        Ok(())
    }

    pub fn read_from<R: Read>(r: &mut R) -> std::io::Result<Self> {
        Ok(Self {
            ncols: r.read_i16::<LittleEndian>()?,
            nrows: r.read_i16::<LittleEndian>()?,
            xllcorner: r.read_f64::<LittleEndian>()?,
            yllcorner: r.read_f64::<LittleEndian>()?,
            cellsize: r.read_f64::<LittleEndian>()?,
            num_tiles: r.read_u32::<LittleEndian>()?,
            num_triangles: r.read_u32::<LittleEndian>()?,
            num_points: r.read_u32::<LittleEndian>()?,
            tile_len: r.read_u32::<LittleEndian>()?,
            min: r.read_i16::<LittleEndian>()?,
            max: r.read_i16::<LittleEndian>()?,
            nodata: r.read_i16::<LittleEndian>()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let header = TinHeader {
            ncols: 391,
            nrows: 472,
            xllcorner: 120.5,
            yllcorner: -35.25,
            cellsize: 30.0,
            num_tiles: 6,
            num_triangles: 12345,
            num_points: 6789,
            tile_len: 200,
            min: -12,
            max: 2104,
            nodata: -9999,
        };
        let mut buf = Vec::new();
        header.write_to(&mut buf).unwrap();
        let restored = TinHeader::read_from(&mut buf.as_slice()).unwrap();
        assert_eq!(restored, header);
    }
}
