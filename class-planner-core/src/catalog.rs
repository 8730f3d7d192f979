use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::types::{CourseOffering, Semester};

/// 单个学期的开课目录，保持插入顺序并按课程代码索引
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<CourseOffering>", into = "Vec<CourseOffering>")]
pub struct SemesterCatalog {
    offerings: Vec<CourseOffering>,
    index: HashMap<String, usize>,
}

impl SemesterCatalog {
    fn insert(&mut self, offering: CourseOffering) {
        match self.index.get(&offering.code) {
            Some(&idx) => self.offerings[idx] = offering,
            None => {
                self.index.insert(offering.code.clone(), self.offerings.len());
                self.offerings.push(offering);
            }
        }
    }

    pub fn get(&self, code: &str) -> Option<&CourseOffering> {
        self.index.get(code).map(|&idx| &self.offerings[idx])
    }

    pub fn offerings(&self) -> &[CourseOffering] {
        &self.offerings
    }
}

impl From<Vec<CourseOffering>> for SemesterCatalog {
    fn from(offerings: Vec<CourseOffering>) -> Self {
        let mut catalog = Self::default();
        for offering in offerings {
            catalog.insert(offering);
        }
        catalog
    }
}

impl From<SemesterCatalog> for Vec<CourseOffering> {
    fn from(catalog: SemesterCatalog) -> Self {
        catalog.offerings
    }
}

/// 全部开课目录：学期 → 课程代码 → 开课信息
///
/// 构建后只读，可以安全地放进 `Arc` 在请求间共享。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    semesters: BTreeMap<Semester, SemesterCatalog>,
}

impl Catalog {
    pub(crate) fn insert(&mut self, offering: CourseOffering) {
        self.semesters
            .entry(offering.semester)
            .or_default()
            .insert(offering);
    }

    /// 开课信息总数
    pub fn len(&self) -> usize {
        self.semesters.values().map(|s| s.offerings.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 按课程代码和学期查找
    pub fn offering(&self, code: &str, semester: Semester) -> Option<&CourseOffering> {
        self.semesters.get(&semester)?.get(code)
    }

    /// 某学期的全部开课信息，按插入顺序
    pub fn offerings(&self, semester: Semester) -> &[CourseOffering] {
        self.semesters
            .get(&semester)
            .map(SemesterCatalog::offerings)
            .unwrap_or_default()
    }

    /// 搜索课程
    ///
    /// `query` 不区分大小写地匹配课程代码或课程名称，`department` 不区分大小写地
    /// 匹配开课院系；空字符串表示不过滤。两个条件同时满足才会返回。
    pub fn search(&self, query: &str, department: &str, semester: Semester) -> Vec<&CourseOffering> {
        let query = query.trim().to_lowercase();
        let department = department.trim().to_lowercase();

        self.offerings(semester)
            .iter()
            .filter(|offering| {
                query.is_empty()
                    || offering.code.to_lowercase().contains(&query)
                    || offering.title.to_lowercase().contains(&query)
            })
            .filter(|offering| {
                department.is_empty() || offering.department.to_lowercase().contains(&department)
            })
            .collect()
    }

    /// 某学期的院系列表，已排序、去重且不含空字符串
    pub fn departments(&self, semester: Semester) -> Vec<String> {
        self.offerings(semester)
            .iter()
            .filter(|offering| !offering.department.is_empty())
            .map(|offering| offering.department.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// 至少有一门课程的学期，按 Sem1, Sem2, Summer, Other 顺序
    pub fn available_semesters(&self) -> Vec<Semester> {
        self.semesters
            .iter()
            .filter(|(_, catalog)| !catalog.offerings.is_empty())
            .map(|(&semester, _)| semester)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RowBuilder, catalog_from};

    fn sample() -> Catalog {
        catalog_from(vec![
            RowBuilder::new("COMP1010")
                .section("1A")
                .title("Introduction to Computing")
                .department("Computer Science")
                .build(),
            RowBuilder::new("MATH1010")
                .section("1A")
                .title("Calculus I")
                .department("Mathematics")
                .build(),
            RowBuilder::new("COMP2020")
                .section("1B")
                .title("Data Structures")
                .department("Computer Science")
                .build(),
            RowBuilder::new("HIST1000")
                .section("1A")
                .title("World History")
                .build(),
            RowBuilder::new("ARTS1000")
                .section("S1")
                .title("Summer Drawing")
                .department("Fine Arts")
                .build(),
        ])
    }

    fn codes(offerings: &[&CourseOffering]) -> Vec<String> {
        offerings.iter().map(|o| o.code.clone()).collect()
    }

    #[test]
    fn test_search_matches_code_or_title() {
        let catalog = sample();
        assert_eq!(
            codes(&catalog.search("comp", "", Semester::Sem1)),
            vec!["COMP1010", "COMP2020"]
        );
        assert_eq!(
            codes(&catalog.search("CALCULUS", "", Semester::Sem1)),
            vec!["MATH1010"]
        );
        assert_eq!(catalog.search("", "", Semester::Sem1).len(), 4);
    }

    #[test]
    fn test_search_department_filter_is_anded() {
        let catalog = sample();
        assert_eq!(
            codes(&catalog.search("", "computer", Semester::Sem1)),
            vec!["COMP1010", "COMP2020"]
        );
        assert_eq!(
            codes(&catalog.search("data", "COMPUTER SCIENCE", Semester::Sem1)),
            vec!["COMP2020"]
        );
        assert!(catalog.search("calculus", "computer", Semester::Sem1).is_empty());
    }

    #[test]
    fn test_search_is_scoped_to_semester() {
        let catalog = sample();
        assert_eq!(
            codes(&catalog.search("", "", Semester::Summer)),
            vec!["ARTS1000"]
        );
        assert!(catalog.search("", "", Semester::Sem2).is_empty());
    }

    #[test]
    fn test_departments_sorted_deduplicated_non_empty() {
        let catalog = sample();
        assert_eq!(
            catalog.departments(Semester::Sem1),
            vec!["Computer Science".to_string(), "Mathematics".to_string()]
        );
        assert!(catalog.departments(Semester::Other).is_empty());
    }

    #[test]
    fn test_available_semesters_in_fixed_order() {
        let catalog = sample();
        assert_eq!(
            catalog.available_semesters(),
            vec![Semester::Sem1, Semester::Summer]
        );
    }

    #[test]
    fn test_offering_lookup() {
        let catalog = sample();
        assert_eq!(
            catalog.offering("MATH1010", Semester::Sem1).unwrap().title,
            "Calculus I"
        );
        assert!(catalog.offering("MATH1010", Semester::Summer).is_none());
        assert!(catalog.offering("NOPE", Semester::Sem1).is_none());
    }

    #[test]
    fn test_serde_roundtrip_rebuilds_index() {
        let catalog = sample();
        let json = serde_json::to_vec(&catalog).unwrap();
        let restored: Catalog = serde_json::from_slice(&json).unwrap();

        assert_eq!(restored.len(), catalog.len());
        assert!(restored.offering("COMP2020", Semester::Sem1).is_some());
        assert_eq!(
            codes(&restored.search("", "", Semester::Sem1)),
            codes(&catalog.search("", "", Semester::Sem1))
        );
    }
}
