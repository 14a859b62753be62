//! Message text

use noticewatch_common::models::Notice;

/// One field per line: label, title, link, post date
pub fn render_notice(notice: &Notice) -> String {
    format!(
        "{}\nTitle: {}\nLink: {}\nPosted: {}",
        notice.label,
        notice.title,
        notice.url,
        notice.post_date_display()
    )
}

/// Sent when a run delivers nothing; `checked_at` is local wall-clock text
pub fn render_heartbeat(checked_at: &str) -> String {
    format!("No new notices found.\nChecked at: {}", checked_at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use noticewatch_common::models::NoticeCategory;

    fn notice(post_date: Option<NaiveDate>) -> Notice {
        Notice {
            id: "dept_scholarship_77".to_string(),
            category: NoticeCategory::DeptScholarship,
            label: NoticeCategory::DeptScholarship.default_label(),
            title: "교내 근로장학생 모집".to_string(),
            url: "https://cs.example.ac.kr/board?articleNo=77".to_string(),
            post_date,
            observed_at: Utc::now(),
        }
    }

    #[test]
    fn test_field_order() {
        let text = render_notice(&notice(NaiveDate::from_ymd_opt(2026, 3, 2)));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "[Department Scholarship Notice]",
                "Title: 교내 근로장학생 모집",
                "Link: https://cs.example.ac.kr/board?articleNo=77",
                "Posted: 2026-03-02",
            ]
        );
    }

    #[test]
    fn test_unknown_post_date() {
        assert!(render_notice(&notice(None)).ends_with("Posted: unknown"));
    }

    #[test]
    fn test_heartbeat() {
        assert_eq!(
            render_heartbeat("2026-03-02 11:00"),
            "No new notices found.\nChecked at: 2026-03-02 11:00"
        );
    }
}
