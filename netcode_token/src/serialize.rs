use std::io;

macro_rules! read_le {
    ($name:ident, $ty:ty) => {
        #[inline]
        pub fn $name(src: &mut impl io::Read) -> Result<$ty, io::Error> {
            let buffer = read_bytes::<{ std::mem::size_of::<$ty>() }>(src)?;
            Ok(<$ty>::from_le_bytes(buffer))
        }
    };
}

read_le!(read_u64, u64);
read_le!(read_u32, u32);
read_le!(read_i32, i32);
read_le!(read_u16, u16);
read_le!(read_u8, u8);

#[inline]
pub fn read_bytes<const N: usize>(src: &mut impl io::Read) -> Result<[u8; N], io::Error> {
    let mut data = [0u8; N];
    src.read_exact(&mut data)?;
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_little_endian() {
        let buffer = [0x01, 0x02, 0x03, 0x04, 0xff, 0xff, 0xff, 0xff, 0x07];
        let src = &mut &buffer[..];
        assert_eq!(read_u16(src).unwrap(), 0x0201);
        assert_eq!(read_u16(src).unwrap(), 0x0403);
        assert_eq!(read_i32(src).unwrap(), -1);
        assert_eq!(read_u8(src).unwrap(), 7);
        assert_eq!(read_u8(src).unwrap_err().kind(), io::ErrorKind::UnexpectedEof);
    }
}
