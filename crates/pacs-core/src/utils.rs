//! 通用工具函数

use rand::Rng;

/// 合成 Study Instance UID 使用的根标识符
pub const SYNTHETIC_UID_ROOT: &str = "1.2.840.113619";

/// 生成合成的 Study Instance UID
///
/// 格式: `<root>.<rand4>.<rand6>_<patientId>_EstudioXA_<index>`，`index` 从1开始。
pub fn synthetic_study_uid<R: Rng + ?Sized>(rng: &mut R, patient_id: &str, index: usize) -> String {
    format!(
        "{}.{}.{}_{}_EstudioXA_{}",
        SYNTHETIC_UID_ROOT,
        rng.gen_range(1000..=9999),
        rng.gen_range(100_000..=999_999),
        patient_id,
        index
    )
}

/// 按行解析PatientID列表，去除首尾空白并丢弃空行
pub fn parse_patient_ids(input: &str) -> Vec<String> {
    input
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// 向下取整的百分比；总数为0时视为已完成
pub fn percent_floor(done: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    // done <= total 时结果不超过100
    (done.min(total) * 100 / total) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_synthetic_study_uid_format() {
        let mut rng = StdRng::seed_from_u64(7);
        let uid = synthetic_study_uid(&mut rng, "123456", 2);

        assert!(uid.starts_with("1.2.840.113619."));
        assert!(uid.ends_with("_123456_EstudioXA_2"));

        let numeric = uid.split('_').next().unwrap();
        let parts: Vec<&str> = numeric.split('.').collect();
        assert_eq!(parts.len(), 6);
        assert_eq!(parts[4].len(), 4);
        assert_eq!(parts[5].len(), 6);
    }

    #[test]
    fn test_parse_patient_ids() {
        let ids = parse_patient_ids("  123456 \n\n   \nABC-9\r\n");
        assert_eq!(ids, vec!["123456".to_string(), "ABC-9".to_string()]);
        assert!(parse_patient_ids("\n  \n").is_empty());
    }

    #[test]
    fn test_percent_floor() {
        assert_eq!(percent_floor(0, 3), 0);
        assert_eq!(percent_floor(1, 3), 33);
        assert_eq!(percent_floor(2, 3), 66);
        assert_eq!(percent_floor(3, 3), 100);
        assert_eq!(percent_floor(5, 3), 100);
        assert_eq!(percent_floor(0, 0), 100);
    }
}
