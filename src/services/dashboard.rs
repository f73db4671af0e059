// src/services/dashboard.rs

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use crate::{
    error::AppError,
    models::{
        dashboard::DashboardStats,
        exam::{Exam, ExamFilter, ExamStatus},
        exam_data::{AssignmentSummary, ExamDataFilter, ExamDataStatus},
        user::{Caller, Role},
    },
    store::Store,
};

const RECENT_LIMIT: usize = 5;

/// Read-only rollups for the role-specific dashboards.
#[derive(Clone)]
pub struct DashboardService {
    store: Arc<dyn Store>,
}

impl DashboardService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn for_caller(&self, caller: Caller) -> Result<DashboardStats, AppError> {
        match caller.role {
            Role::Student => self.student(caller).await,
            Role::Teacher => self.teacher(caller).await,
            Role::Admin => self.admin().await,
        }
    }

    /// Exam counts cover exams the user created; the student's own
    /// assignments are summarised separately.
    pub async fn student(&self, caller: Caller) -> Result<DashboardStats, AppError> {
        let created = self.exams_created_by(caller.id).await?;
        let mut stats = rollup(&created);

        let assignments = self
            .store
            .list_exam_data(&ExamDataFilter {
                student_id: Some(caller.id),
                ..Default::default()
            })
            .await?;

        stats.assignment_summary = Some(AssignmentSummary::from_rows(&assignments));
        stats.exam_data_list = assignments;
        Ok(stats)
    }

    pub async fn teacher(&self, caller: Caller) -> Result<DashboardStats, AppError> {
        let exams = self.exams_created_by(caller.id).await?;
        let mut stats = rollup(&exams);

        let students = self.store.list_users(Some(Role::Student)).await?;
        let own_students: HashSet<i64> = students
            .iter()
            .filter(|s| s.teacher_id == Some(caller.id))
            .map(|s| s.id)
            .collect();
        stats.total_students = own_students.len();

        let own_exams: HashSet<i64> = exams.iter().map(|e| e.id).collect();
        let all_data = self.store.list_exam_data(&ExamDataFilter::default()).await?;

        stats.grading_queue = Some(
            all_data
                .iter()
                .filter(|d| d.status == ExamDataStatus::Pending)
                .filter(|d| own_exams.contains(&d.exam_id) || own_students.contains(&d.student_id))
                .cloned()
                .collect(),
        );
        stats.exam_data_list = all_data
            .into_iter()
            .filter(|d| own_exams.contains(&d.exam_id))
            .collect();

        Ok(stats)
    }

    pub async fn admin(&self) -> Result<DashboardStats, AppError> {
        let exams = self.store.list_exams(&ExamFilter::default()).await?;
        let mut stats = rollup(&exams);

        stats.total_students = self.store.list_users(Some(Role::Student)).await?.len();
        stats.exam_data_list = self.store.list_exam_data(&ExamDataFilter::default()).await?;
        stats.papers = Some(self.store.list_papers(None).await?);
        stats.users = Some(self.store.list_users(None).await?);

        Ok(stats)
    }

    async fn exams_created_by(&self, user_id: i64) -> Result<Vec<Exam>, AppError> {
        self.store
            .list_exams(&ExamFilter {
                creator_id: Some(user_id),
                ..Default::default()
            })
            .await
    }
}

/// Counts, recents and histogram over `exams`, which arrive newest first.
fn rollup(exams: &[Exam]) -> DashboardStats {
    let mut stats = DashboardStats {
        total_papers: exams.len(),
        ..Default::default()
    };

    let mut by_subject: BTreeMap<String, usize> = BTreeMap::new();
    let mut scored_total = 0.0;
    let mut scored = 0usize;

    for exam in exams {
        match exam.status {
            ExamStatus::Approved | ExamStatus::Published => stats.approved_papers += 1,
            ExamStatus::Pending => {
                stats.pending_papers += 1;
                stats.pending_paper_list.push(exam.clone());
            }
            ExamStatus::Rejected => stats.rejected_papers += 1,
            ExamStatus::Draft => {}
        }

        *by_subject.entry(exam.course.clone()).or_default() += 1;

        if exam.total_score > 0.0 {
            scored_total += exam.total_score;
            scored += 1;
        }
    }

    stats.recent_papers = exams.iter().take(RECENT_LIMIT).cloned().collect();
    stats.papers_by_subject = by_subject;
    if scored > 0 {
        stats.average_score = scored_total / scored as f64;
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::fixtures::world;

    #[tokio::test]
    async fn teacher_counts_and_queue() {
        let w = world();
        let (t_user, teacher) = w.user("t", Role::Teacher).await;
        let (_, admin) = w.user("a", Role::Admin).await;
        let (_, student) = w.user("s", Role::Student).await;
        w.store.link_students(t_user.id).await.unwrap();

        w.draft(teacher, "Draft").await;
        let pending = w.draft(teacher, "Pending").await;
        w.services.exams.submit(teacher, pending.id).await.unwrap();
        let live = w.published(teacher, admin, "Live").await;
        w.services.grading.submit_answer(student, live.id, "42").await.unwrap();

        let stats = w.services.dashboard.for_caller(teacher).await.unwrap();
        assert_eq!(stats.total_papers, 3);
        assert_eq!(stats.approved_papers, 1);
        assert_eq!(stats.pending_papers, 1);
        assert_eq!(stats.pending_paper_list[0].id, pending.id);
        assert_eq!(stats.papers_by_subject.get("math"), Some(&3));
        assert_eq!(stats.average_score, 100.0);
        assert_eq!(stats.total_students, 1);
        assert_eq!(stats.grading_queue.as_ref().map(Vec::len), Some(1));
        assert_eq!(stats.exam_data_list.len(), 1);
        assert!(stats.assignment_summary.is_none());
    }

    #[tokio::test]
    async fn student_sees_assignment_summary() {
        let w = world();
        let (_, teacher) = w.user("t", Role::Teacher).await;
        let (_, admin) = w.user("a", Role::Admin).await;
        let (_, student) = w.user("s", Role::Student).await;
        let a = w.published(teacher, admin, "A").await;
        w.published(teacher, admin, "B").await;
        let data = w.services.grading.submit_answer(student, a.id, "42").await.unwrap();
        w.services.grading.grade(teacher, data.id, 80.0, None).await.unwrap();

        let stats = w.services.dashboard.for_caller(student).await.unwrap();
        assert_eq!(stats.total_papers, 0);
        assert_eq!(stats.exam_data_list.len(), 2);
        let summary = stats.assignment_summary.unwrap();
        assert_eq!(summary.assigned, 1);
        assert_eq!(summary.graded, 1);
        assert_eq!(summary.average_score, 80.0);
    }

    #[tokio::test]
    async fn admin_sees_everything() {
        let w = world();
        let (_, teacher) = w.user("t", Role::Teacher).await;
        let (_, admin) = w.user("a", Role::Admin).await;
        w.user("s", Role::Student).await;
        for i in 0..7 {
            w.draft(teacher, &format!("E{}", i)).await;
        }

        let stats = w.services.dashboard.for_caller(admin).await.unwrap();
        assert_eq!(stats.total_papers, 7);
        assert_eq!(stats.recent_papers.len(), RECENT_LIMIT);
        assert_eq!(stats.recent_papers[0].title, "E6");
        assert_eq!(stats.total_students, 1);
        assert_eq!(stats.users.as_ref().map(Vec::len), Some(3));
        assert!(stats.papers.is_some());
    }
}
