use axum::{extract::State, Json};
use common_http_errors::ApiResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

use crate::app_state::AppState;
use crate::cliq::templates::{self, TaskCard};
use crate::cliq::{ChannelTarget, CliqChannel, CliqMessage, NotifyError, ThreadSeed};
use crate::error::ServiceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemplateType {
    #[serde(rename = "Simple Message")]
    SimpleMessage,
    #[serde(rename = "New Project")]
    NewProject,
    #[serde(rename = "Task Assignment")]
    TaskAssignment,
    #[serde(rename = "Material Request")]
    MaterialRequest,
    #[serde(rename = "Meeting Schedule")]
    MeetingSchedule,
    #[serde(rename = "Status Update")]
    StatusUpdate,
}

impl TemplateType {
    fn default_channel(&self) -> CliqChannel {
        match self {
            TemplateType::NewProject | TemplateType::TaskAssignment => CliqChannel::Project,
            TemplateType::MaterialRequest => CliqChannel::Purchase,
            TemplateType::SimpleMessage | TemplateType::MeetingSchedule | TemplateType::StatusUpdate => {
                CliqChannel::Notification
            }
        }
    }
}

/// A hand-written chat notification. Which fields are required depends on `template_type`.
#[derive(Debug, Clone, Deserialize)]
pub struct ManualNotification {
    pub template_type: TemplateType,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub custom_channel_name: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub erp_link: Option<String>,
    #[serde(default)]
    pub assigned_to: Option<String>,

    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub project_name: Option<String>,
    #[serde(default)]
    pub customer_name: Option<String>,

    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub task_name: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub task_description: Option<String>,

    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub request_title: Option<String>,
    #[serde(default)]
    pub requested_by: Option<String>,
    #[serde(default)]
    pub items: Vec<String>,
    #[serde(default)]
    pub urgency: Option<String>,

    #[serde(default)]
    pub meeting_title: Option<String>,
    #[serde(default)]
    pub scheduled_by: Option<String>,
    /// Comma separated.
    #[serde(default)]
    pub participants: Option<String>,
    #[serde(default)]
    pub date_time: Option<String>,
    #[serde(default)]
    pub duration: Option<String>,

    #[serde(default)]
    pub status_title: Option<String>,
    /// JSON object of label/value pairs; anything else is shown as a single `Status` row.
    #[serde(default)]
    pub status_details: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct NotificationReceipt {
    pub channel: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    pub thread_created: bool,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn require<'a>(value: &'a Option<String>, message: &str) -> Result<&'a str, ServiceError> {
    present(value).ok_or_else(|| ServiceError::invalid("missing_field", message))
}

impl ManualNotification {
    pub fn validate(&self) -> Result<(), ServiceError> {
        match self.template_type {
            TemplateType::SimpleMessage => {
                require(&self.message, "Message is required for Simple Message template")?;
            }
            TemplateType::NewProject => {
                require(&self.project_id, "Project ID is required for New Project template")?;
                require(&self.customer_name, "Customer Name is required for New Project template")?;
            }
            TemplateType::TaskAssignment => {
                require(&self.task_id, "Task ID is required for Task Assignment template")?;
            }
            TemplateType::MaterialRequest => {
                require(&self.request_id, "Request ID is required for Material Request template")?;
                require(&self.requested_by, "Requested By is required for Material Request template")?;
            }
            TemplateType::MeetingSchedule => {
                require(&self.meeting_title, "Meeting Title is required for Meeting Schedule template")?;
                require(&self.scheduled_by, "Scheduled By is required for Meeting Schedule template")?;
                if self.participant_list().is_empty() {
                    return Err(ServiceError::invalid(
                        "missing_field",
                        "Participants are required for Meeting Schedule template",
                    ));
                }
                require(&self.date_time, "Date & Time is required for Meeting Schedule template")?;
            }
            TemplateType::StatusUpdate => {
                require(&self.status_title, "Status Title is required for Status Update template")?;
                require(&self.status_details, "Status Details are required for Status Update template")?;
            }
        }
        Ok(())
    }

    pub fn target(&self) -> Result<ChannelTarget, ServiceError> {
        match present(&self.channel) {
            None => Ok(ChannelTarget::Channel(self.template_type.default_channel())),
            Some(raw) if raw.eq_ignore_ascii_case("other") => present(&self.custom_channel_name)
                .map(|name| ChannelTarget::Custom(name.to_string()))
                .ok_or_else(|| ServiceError::invalid("missing_field", "Please provide Custom Channel Name")),
            Some(raw) => CliqChannel::from_str(raw).map(ChannelTarget::Channel).ok_or_else(|| {
                let supported = CliqChannel::ALL.iter().map(|c| c.as_str()).collect::<Vec<_>>().join(", ");
                ServiceError::invalid(
                    "unknown_channel",
                    format!("Channel '{raw}' not supported. Supported channels: {supported}"),
                )
            }),
        }
    }

    fn participant_list(&self) -> Vec<String> {
        self.participants
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect()
    }

    fn status_rows(&self) -> Vec<(String, String)> {
        let raw = self.status_details.as_deref().unwrap_or_default();
        match serde_json::from_str::<BTreeMap<String, serde_json::Value>>(raw) {
            Ok(map) => map
                .into_iter()
                .map(|(k, v)| match v {
                    serde_json::Value::String(s) => (k, s),
                    other => (k, other.to_string()),
                })
                .collect(),
            Err(_) => vec![("Status".to_string(), raw.to_string())],
        }
    }

    /// Renders the chat message, plus a thread seed for new projects.
    pub fn render(&self, site_url: &str) -> (CliqMessage, Option<ThreadSeed>) {
        let text = |v: &Option<String>| present(v).unwrap_or_default().to_string();
        let link_or = |slug: &str, id: &str| {
            present(&self.erp_link).map(str::to_string).unwrap_or_else(|| templates::erp_link(site_url, slug, id))
        };
        match self.template_type {
            TemplateType::SimpleMessage => (CliqMessage::text(text(&self.message)), None),
            TemplateType::NewProject => {
                let project_id = text(&self.project_id);
                let msg = templates::new_project(
                    &project_id,
                    present(&self.project_name),
                    present(&self.assigned_to),
                    &text(&self.customer_name),
                    &link_or("project", &project_id),
                );
                let seed = ThreadSeed {
                    title: format!("Discussion - {project_id}"),
                    message: format!(
                        "Thread for project **{project_id}** discussions.\nPlease use this thread to collaborate on tasks, updates, and clarifications."
                    ),
                };
                (msg, Some(seed))
            }
            TemplateType::TaskAssignment => {
                let task_id = text(&self.task_id);
                let link = link_or("task", &task_id);
                let task_name = text(&self.task_name);
                let card = TaskCard {
                    task_id: &task_id,
                    task_name: &task_name,
                    assigned_to: present(&self.assigned_to),
                    due_date: present(&self.due_date),
                    priority: present(&self.priority).unwrap_or("Medium"),
                    link: &link,
                    description: present(&self.task_description),
                };
                (templates::task_assignment(&card), None)
            }
            TemplateType::MaterialRequest => {
                let request_id = text(&self.request_id);
                let msg = templates::material_request(
                    &request_id,
                    present(&self.request_title),
                    &text(&self.requested_by),
                    &self.items,
                    present(&self.urgency).unwrap_or("Normal"),
                    &link_or("material-request", &request_id),
                );
                (msg, None)
            }
            TemplateType::MeetingSchedule => {
                let msg = templates::meeting_schedule(
                    &text(&self.meeting_title),
                    &text(&self.scheduled_by),
                    &self.participant_list(),
                    &text(&self.date_time),
                    present(&self.duration).unwrap_or("1 hour"),
                    present(&self.erp_link),
                );
                (msg, None)
            }
            TemplateType::StatusUpdate => {
                let msg = templates::status_update(
                    &text(&self.status_title),
                    &self.status_rows(),
                    present(&self.assigned_to),
                    present(&self.erp_link),
                );
                (msg, None)
            }
        }
    }
}

fn target_label(target: &ChannelTarget) -> String {
    match target {
        ChannelTarget::Channel(c) => c.as_str().to_string(),
        ChannelTarget::Custom(name) => name.clone(),
    }
}

pub async fn send_manual(state: &AppState, notification: &ManualNotification) -> Result<NotificationReceipt, ServiceError> {
    notification.validate()?;
    let target = notification.target()?;
    if !state.notifier.enabled() {
        return Err(NotifyError::Disabled.into());
    }
    let (message, thread) = notification.render(&state.config.site_url);
    let receipt = if notification.template_type == TemplateType::SimpleMessage {
        state.notifier.post_to(&target, &message).await?;
        NotificationReceipt { channel: target_label(&target), message_id: None, thread_created: false }
    } else {
        let post = state.notifier.send_with_thread(&target, &message, thread).await?;
        NotificationReceipt {
            channel: target_label(&target),
            message_id: Some(post.message_id),
            thread_created: post.thread_created,
        }
    };
    info!(template = ?notification.template_type, channel = %receipt.channel, "manual notification sent");
    Ok(receipt)
}

/// `POST /notifications`
pub async fn send_notification(
    State(state): State<AppState>,
    Json(notification): Json<ManualNotification>,
) -> ApiResult<Json<NotificationReceipt>> {
    Ok(Json(send_manual(&state, &notification).await?))
}
