//! # 设备无关位图（DIB）解码
//!
//! 剪贴板中的 `CF_DIB`/`CF_DIBV5` 只有信息头与像素，没有 BMP 文件头。
//! 这里补上 14 字节的 `BITMAPFILEHEADER`，再交给 `image` 的 BMP 解码器。
//!
//! 负载既可能是连续字节，也可能是游标位置不确定的流：
//! 流在读取前一律先回到起点。

use image::{DynamicImage, ImageFormat};

use crate::clipboard::RawPayload;

const FILE_HEADER_SIZE: usize = 14;
const CORE_HEADER_SIZE: u32 = 12;
const INFO_HEADER_SIZE: u32 = 40;
const BI_BITFIELDS: u32 = 3;
const BI_ALPHABITFIELDS: u32 = 6;

/// 将 DIB 负载解码为图像。
pub fn decode_dib(payload: &mut RawPayload) -> Result<DynamicImage, String> {
    let dib = payload
        .read_all()
        .map_err(|e| format!("读取 DIB 数据失败：{}", e))?;
    if dib.is_empty() {
        return Err("DIB 数据为空".to_string());
    }
    let file = dib_to_bmp_file(&dib)?;
    image::load_from_memory_with_format(&file, ImageFormat::Bmp)
        .map_err(|e| format!("DIB 解码失败：{}", e))
}

/// 为 DIB 拼接 BMP 文件头，计算像素数据偏移。
pub fn dib_to_bmp_file(dib: &[u8]) -> Result<Vec<u8>, String> {
    let header_size = read_u32(dib, 0).ok_or("DIB 信息头不完整")?;
    let pixel_offset = pixel_data_offset(dib, header_size)?;

    let file_size = FILE_HEADER_SIZE + dib.len();
    if pixel_offset > file_size {
        return Err(format!(
            "DIB 像素偏移 {} 超出数据长度 {}",
            pixel_offset, file_size
        ));
    }

    let mut file = Vec::with_capacity(file_size);
    file.extend_from_slice(b"BM");
    file.extend_from_slice(&(file_size as u32).to_le_bytes());
    file.extend_from_slice(&[0, 0, 0, 0]);
    file.extend_from_slice(&(pixel_offset as u32).to_le_bytes());
    file.extend_from_slice(dib);
    Ok(file)
}

fn pixel_data_offset(dib: &[u8], header_size: u32) -> Result<usize, String> {
    if header_size == CORE_HEADER_SIZE {
        let bit_count = read_u16(dib, 10).ok_or("BITMAPCOREHEADER 不完整")?;
        let palette = if bit_count <= 8 { 1_usize << bit_count } else { 0 };
        return Ok(FILE_HEADER_SIZE + CORE_HEADER_SIZE as usize + palette * 3);
    }

    if header_size < INFO_HEADER_SIZE || header_size as usize > dib.len() {
        return Err(format!("不支持的 DIB 信息头大小：{}", header_size));
    }

    let bit_count = read_u16(dib, 14).ok_or("DIB 位深字段缺失")?;
    let compression = read_u32(dib, 16).ok_or("DIB 压缩字段缺失")?;
    let colors_used = read_u32(dib, 32).ok_or("DIB 调色板字段缺失")?;

    // 只有 40 字节的信息头会把颜色掩码放在头部之后
    let masks = match (header_size, compression) {
        (INFO_HEADER_SIZE, BI_BITFIELDS) => 12,
        (INFO_HEADER_SIZE, BI_ALPHABITFIELDS) => 16,
        _ => 0,
    };

    let palette = if colors_used > 0 {
        colors_used as usize
    } else if bit_count <= 8 {
        1_usize << bit_count
    } else {
        0
    };

    Ok(FILE_HEADER_SIZE + header_size as usize + masks + palette * 4)
}

fn read_u16(bytes: &[u8], offset: usize) -> Option<u16> {
    bytes
        .get(offset..offset + 2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]))
}

fn read_u32(bytes: &[u8], offset: usize) -> Option<u32> {
    bytes
        .get(offset..offset + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

#[cfg(test)]
mod tests {
    use super::{decode_dib, dib_to_bmp_file};
    use crate::clipboard::RawPayload;
    use image::GenericImageView;
    use std::io::{Cursor, Seek, SeekFrom};

    /// 2x2、24 位、自底向上的 DIB，每行 6 字节补齐到 8 字节。
    fn bottom_up_24bit_dib() -> Vec<u8> {
        let mut dib = Vec::new();
        dib.extend_from_slice(&40_u32.to_le_bytes());
        dib.extend_from_slice(&2_i32.to_le_bytes());
        dib.extend_from_slice(&2_i32.to_le_bytes());
        dib.extend_from_slice(&1_u16.to_le_bytes());
        dib.extend_from_slice(&24_u16.to_le_bytes());
        dib.extend_from_slice(&0_u32.to_le_bytes()); // BI_RGB
        dib.extend_from_slice(&16_u32.to_le_bytes());
        dib.extend_from_slice(&[0; 16]);
        // 底行：蓝、绿
        dib.extend_from_slice(&[255, 0, 0, 0, 255, 0, 0, 0]);
        // 顶行：红、白
        dib.extend_from_slice(&[0, 0, 255, 255, 255, 255, 0, 0]);
        dib
    }

    #[test]
    fn file_header_points_past_info_header() {
        let file = dib_to_bmp_file(&bottom_up_24bit_dib()).expect("wrap dib");
        assert_eq!(&file[..2], b"BM");
        assert_eq!(u32::from_le_bytes([file[10], file[11], file[12], file[13]]), 54);
    }

    #[test]
    fn decodes_contiguous_bytes() {
        let mut payload = RawPayload::Bytes(bottom_up_24bit_dib());
        let image = decode_dib(&mut payload).expect("decode");
        assert_eq!(image.dimensions(), (2, 2));
        assert_eq!(image.get_pixel(0, 0).0, [255, 0, 0, 255]);
        assert_eq!(image.get_pixel(0, 1).0, [0, 0, 255, 255]);
    }

    #[test]
    fn stream_position_is_reset_before_reading() {
        let mut cursor = Cursor::new(bottom_up_24bit_dib());
        cursor.seek(SeekFrom::End(0)).expect("seek to end");
        let mut payload = RawPayload::Stream(Box::new(cursor));
        let image = decode_dib(&mut payload).expect("decode");
        assert_eq!(image.dimensions(), (2, 2));
    }

    #[test]
    fn rejects_empty_and_truncated_headers() {
        assert!(decode_dib(&mut RawPayload::Bytes(Vec::new())).is_err());
        assert!(dib_to_bmp_file(&[40, 0, 0]).is_err());
        assert!(dib_to_bmp_file(&[200, 0, 0, 0, 1, 2, 3, 4]).is_err());
    }
}
