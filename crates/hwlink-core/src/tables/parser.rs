//! Shared table validation and flash layout resolution

use crate::error::ParseError;

use super::types::*;

/// Validate a table's bounds and integrity, returning the header and the
/// exact payload range.
///
/// Check order is fixed: header presence, then declared size against the
/// containing buffer, then CRC32 over the declared payload. A buffer that
/// fails any check is rejected whole.
pub fn validate_table(buf: &[u8]) -> Result<(TableHeader, &[u8]), ParseError> {
    let header = TableHeader::parse(buf)?;

    let total = header.total_size();
    if total > buf.len() {
        return Err(ParseError::SizeMismatch {
            declared: header.table_size as usize,
            available: buf.len() - TABLE_HEADER_SIZE,
        });
    }

    let body = &buf[TABLE_HEADER_SIZE..total];
    let computed = crc32fast::hash(body);
    if computed != header.crc32 {
        return Err(ParseError::CrcMismatch {
            stored: header.crc32,
            computed,
        });
    }

    Ok((header, body))
}

/// Validate a table and interpret it as layout `T`.
///
/// Every table kind goes through the identical validation path; only the
/// final field interpretation differs. The returned value owns its data —
/// no references into `buf` survive the call.
pub fn parse_table<T: TableLayout>(buf: &[u8]) -> Result<T, ParseError> {
    let (header, body) = validate_table(buf)?;
    if header.table_type != T::TABLE_TYPE {
        return Err(ParseError::WrongTableType {
            expected: T::TABLE_TYPE,
            found: header.table_type,
        });
    }
    T::parse(header, body)
}

/// Resolve the section layout for one `(region, version)` pair
///
/// The mapping is enumerated, not computed; a version missing from it is a
/// hard error carrying the offending number.
pub fn flash_structure(region: FlashRegion, version: u16) -> Result<FlashStructure, ParseError> {
    use super::types::table_id::*;

    match (region, version) {
        (FlashRegion::ReadWrite, 0x0100) => Ok(FlashStructure {
            payload_count: 2,
            table_ids: &[DEPTH_CALIBRATION, RGB_CALIBRATION],
        }),
        (FlashRegion::ReadWrite, 0x0101) => Ok(FlashStructure {
            payload_count: 3,
            table_ids: &[DEPTH_CALIBRATION, RGB_CALIBRATION, IMU_CALIBRATION],
        }),
        (FlashRegion::ReadOnly, 0x0100) => Ok(FlashStructure {
            payload_count: 1,
            table_ids: &[MODULE_INFO],
        }),
        (FlashRegion::ReadOnly, 0x0101) => Ok(FlashStructure {
            payload_count: 2,
            table_ids: &[MODULE_INFO, FACTORY_CALIBRATION],
        }),
        (_, version) => Err(ParseError::UnsupportedVersion { version }),
    }
}

/// Parse one region's table of contents
pub fn parse_flash_toc(buf: &[u8], region: FlashRegion) -> Result<FlashToc, ParseError> {
    let (header, body) = validate_table(buf)?;

    let expected_type = match region {
        FlashRegion::ReadWrite => table_id::TOC_READ_WRITE,
        FlashRegion::ReadOnly => table_id::TOC_READ_ONLY,
    };
    if header.table_type != expected_type {
        return Err(ParseError::WrongTableType {
            expected: expected_type,
            found: header.table_type,
        });
    }

    let structure = flash_structure(region, header.version)?;

    if body.len() % FLASH_DESCRIPTOR_SIZE != 0 {
        return Err(ParseError::SizeMismatch {
            declared: body.len(),
            available: (body.len() / FLASH_DESCRIPTOR_SIZE) * FLASH_DESCRIPTOR_SIZE,
        });
    }

    let mut tables = Vec::with_capacity(body.len() / FLASH_DESCRIPTOR_SIZE);
    for offset in (0..body.len()).step_by(FLASH_DESCRIPTOR_SIZE) {
        let descriptor = parse_descriptor(body, offset);
        let end = descriptor.offset as usize + descriptor.size as usize;
        if end > FLASH_SIZE {
            return Err(ParseError::SizeMismatch {
                declared: end,
                available: FLASH_SIZE,
            });
        }
        tables.push(descriptor);
    }

    log::debug!(
        "{region:?} TOC version 0x{:04X}: {} descriptor(s)",
        header.version,
        tables.len()
    );

    Ok(FlashToc {
        header,
        structure,
        tables,
    })
}

/// Resolve the full flash layout from a flash image
///
/// Reads the top-level info header and both region tables of contents at
/// their fixed offsets and assembles the aggregate. Unknown versions in
/// any of the three fail loudly.
pub fn get_flash_info(image: &[u8]) -> Result<FlashInfo, ParseError> {
    if image.len() < FLASH_SIZE {
        return Err(ParseError::TooShort {
            len: image.len(),
            need: FLASH_SIZE,
        });
    }

    let info: FlashInfoHeader = parse_table(&image[FLASH_INFO_OFFSET..])?;
    let rw = parse_flash_toc(&image[FLASH_RW_TOC_OFFSET..], FlashRegion::ReadWrite)?;
    let ro = parse_flash_toc(&image[FLASH_RO_TOC_OFFSET..], FlashRegion::ReadOnly)?;

    Ok(FlashInfo {
        read_write: FlashSection {
            base_offset: info.read_write_base,
            version: rw.header.version,
            structure: rw.structure,
            tables: rw.tables,
        },
        read_only: FlashSection {
            base_offset: info.read_only_base,
            version: ro.header.version,
            structure: ro.structure,
            tables: ro.tables,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParseError;

    /// Serialize a table with a correct CRC over `body`.
    fn make_table(version: u16, table_type: u16, param: u32, body: &[u8]) -> Vec<u8> {
        let header = TableHeader {
            version,
            table_type,
            table_size: body.len() as u32,
            param,
            crc32: crc32fast::hash(body),
        };
        let mut buf = header.to_bytes().to_vec();
        buf.extend_from_slice(body);
        buf
    }

    fn depth_calibration_body() -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(&50.0f32.to_le_bytes()); // baseline
        for _ in 0..2 {
            body.extend_from_slice(&1280u16.to_le_bytes());
            body.extend_from_slice(&800u16.to_le_bytes());
            body.extend_from_slice(&640.5f32.to_le_bytes());
            body.extend_from_slice(&640.5f32.to_le_bytes());
            body.extend_from_slice(&639.0f32.to_le_bytes());
            body.extend_from_slice(&399.0f32.to_le_bytes());
        }
        body
    }

    #[test]
    fn parse_depth_calibration() {
        let buf = make_table(0x0200, table_id::DEPTH_CALIBRATION, 0, &depth_calibration_body());
        let table: DepthCalibration = parse_table(&buf).unwrap();

        assert_eq!(table.header.table_type, table_id::DEPTH_CALIBRATION);
        assert_eq!(table.baseline_mm, 50.0);
        assert_eq!(table.left.width, 1280);
        assert_eq!(table.left.height, 800);
        assert_eq!(table.right.fx, 640.5);
    }

    #[test]
    fn crc_rejection_on_flipped_bit() {
        let mut buf = make_table(0x0200, table_id::DEPTH_CALIBRATION, 0, &depth_calibration_body());
        let stored = TableHeader::parse(&buf).unwrap().crc32;

        // Flip one bit inside the declared payload range.
        buf[TABLE_HEADER_SIZE + 7] ^= 0x01;

        match validate_table(&buf).unwrap_err() {
            ParseError::CrcMismatch {
                stored: s,
                computed,
            } => {
                assert_eq!(s, stored);
                assert_ne!(computed, stored);
            }
            other => panic!("expected CrcMismatch, got {other:?}"),
        }
    }

    #[test]
    fn size_bound_rejected_before_crc() {
        let body = depth_calibration_body();
        let mut buf = make_table(0x0200, table_id::DEPTH_CALIBRATION, 0, &body);

        // Declare more payload than the buffer holds and corrupt the CRC
        // too: the size check must win.
        let oversize = (body.len() + 100) as u32;
        buf[4..8].copy_from_slice(&oversize.to_le_bytes());
        buf[12..16].copy_from_slice(&0xDEADBEEFu32.to_le_bytes());

        assert_eq!(
            validate_table(&buf).unwrap_err(),
            ParseError::SizeMismatch {
                declared: body.len() + 100,
                available: body.len(),
            }
        );
    }

    #[test]
    fn wrong_table_type_rejected() {
        let buf = make_table(0x0200, table_id::RGB_CALIBRATION, 0, &depth_calibration_body());
        let err = parse_table::<DepthCalibration>(&buf).unwrap_err();
        assert_eq!(
            err,
            ParseError::WrongTableType {
                expected: table_id::DEPTH_CALIBRATION,
                found: table_id::RGB_CALIBRATION,
            }
        );
    }

    #[test]
    fn unsupported_table_version_rejected() {
        let buf = make_table(0x0300, table_id::DEPTH_CALIBRATION, 0, &depth_calibration_body());
        assert_eq!(
            parse_table::<DepthCalibration>(&buf).unwrap_err(),
            ParseError::UnsupportedVersion { version: 0x0300 }
        );
    }

    #[test]
    fn unknown_toc_version_fails_loudly() {
        assert_eq!(
            flash_structure(FlashRegion::ReadWrite, 0x0177).unwrap_err(),
            ParseError::UnsupportedVersion { version: 0x0177 }
        );
        assert!(flash_structure(FlashRegion::ReadWrite, 0x0101).is_ok());
        assert!(flash_structure(FlashRegion::ReadOnly, 0x0100).is_ok());
    }

    fn descriptor_bytes(table_id: u16, version: u16, offset: u32, size: u32) -> Vec<u8> {
        let mut buf = Vec::with_capacity(FLASH_DESCRIPTOR_SIZE);
        buf.extend_from_slice(&table_id.to_le_bytes());
        buf.extend_from_slice(&version.to_le_bytes());
        buf.extend_from_slice(&offset.to_le_bytes());
        buf.extend_from_slice(&size.to_le_bytes());
        buf
    }

    /// Build a full flash image with both TOCs and the info header.
    fn flash_image() -> Vec<u8> {
        let mut image = vec![0u8; FLASH_SIZE];

        let mut rw_body = Vec::new();
        rw_body.extend_from_slice(&descriptor_bytes(table_id::DEPTH_CALIBRATION, 0x0200, 0x2000, 64));
        rw_body.extend_from_slice(&descriptor_bytes(table_id::RGB_CALIBRATION, 0x0100, 0x3000, 48));
        rw_body.extend_from_slice(&descriptor_bytes(table_id::IMU_CALIBRATION, 0x0100, 0x4000, 32));
        let rw_toc = make_table(0x0101, table_id::TOC_READ_WRITE, 0, &rw_body);
        image[FLASH_RW_TOC_OFFSET..FLASH_RW_TOC_OFFSET + rw_toc.len()].copy_from_slice(&rw_toc);

        let ro_body = descriptor_bytes(table_id::MODULE_INFO, 0x0100, 0x1000, 96);
        let ro_toc = make_table(0x0100, table_id::TOC_READ_ONLY, 0, &ro_body);
        image[FLASH_RO_TOC_OFFSET..FLASH_RO_TOC_OFFSET + ro_toc.len()].copy_from_slice(&ro_toc);

        let mut info_body = Vec::new();
        info_body.extend_from_slice(&0x0001_0000u32.to_le_bytes()); // rw base
        info_body.extend_from_slice(&0x0018_0000u32.to_le_bytes()); // ro base
        let info = make_table(0x0100, table_id::FLASH_INFO, 0, &info_body);
        image[FLASH_INFO_OFFSET..FLASH_INFO_OFFSET + info.len()].copy_from_slice(&info);

        image
    }

    #[test]
    fn flash_info_assembly() {
        let image = flash_image();
        let info = get_flash_info(&image).unwrap();

        assert_eq!(info.read_write.base_offset, 0x0001_0000);
        assert_eq!(info.read_only.base_offset, 0x0018_0000);
        assert_eq!(info.read_write.version, 0x0101);
        assert_eq!(info.read_write.structure.payload_count, 3);
        assert_eq!(info.read_write.tables.len(), 3);
        assert_eq!(info.read_only.tables.len(), 1);

        let (region, descriptor) = info.find_table(table_id::RGB_CALIBRATION).unwrap();
        assert_eq!(region, FlashRegion::ReadWrite);
        assert_eq!(descriptor.offset, 0x3000);
        assert_eq!(descriptor.size, 48);
    }

    #[test]
    fn extract_table_range() {
        let mut image = flash_image();
        // rw base 0x10000 + depth offset 0x2000
        image[0x0001_2000..0x0001_2000 + 64].copy_from_slice(&[0xA5; 64]);

        let info = get_flash_info(&image).unwrap();
        let range = info.extract_table(&image, table_id::DEPTH_CALIBRATION).unwrap();
        assert_eq!(range, &[0xA5; 64][..]);

        assert!(info.find_table(table_id::FACTORY_CALIBRATION).is_none());
    }

    #[test]
    fn truncated_image_rejected() {
        let image = vec![0u8; FLASH_SIZE - 1];
        assert_eq!(
            get_flash_info(&image).unwrap_err(),
            ParseError::TooShort {
                len: FLASH_SIZE - 1,
                need: FLASH_SIZE
            }
        );
    }

    #[test]
    fn toc_with_unknown_version_rejected() {
        let mut image = flash_image();
        // Rewrite the RW TOC with a version the structure map does not list.
        let rw_body = descriptor_bytes(table_id::DEPTH_CALIBRATION, 0x0200, 0x2000, 64);
        let rw_toc = make_table(0x0177, table_id::TOC_READ_WRITE, 0, &rw_body);
        image[FLASH_RW_TOC_OFFSET..FLASH_RW_TOC_OFFSET + rw_toc.len()].copy_from_slice(&rw_toc);
        // Zero the tail left over from the longer original TOC.
        image[FLASH_RW_TOC_OFFSET + rw_toc.len()..FLASH_RW_TOC_OFFSET + 0x100].fill(0);

        assert_eq!(
            get_flash_info(&image).unwrap_err(),
            ParseError::UnsupportedVersion { version: 0x0177 }
        );
    }
}
