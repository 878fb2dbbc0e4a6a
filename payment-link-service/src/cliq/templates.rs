use bigdecimal::BigDecimal;
use common_money::{format_amount, normalize_scale};

use super::{CliqMessage, Slide};
use crate::store::DocumentKind;

const THEME: &str = "modern-inline";
const TASK_DESCRIPTION_LIMIT: usize = 500;

/// `{@user}` mention, empty for a blank user.
pub fn mention(user: &str) -> String {
    let user = user.trim();
    if user.is_empty() { String::new() } else { format!("{{@{user}}}") }
}

/// Desk URL of a record in the ERP.
pub fn erp_link(site_url: &str, slug: &str, id: &str) -> String {
    format!("{}/app/{}/{}", site_url.trim_end_matches('/'), slug, id)
}

fn truncate(value: &str, max: usize, keep: usize) -> String {
    if value.chars().count() > max {
        let head: String = value.chars().take(keep).collect();
        format!("{head}...")
    } else {
        value.to_string()
    }
}

fn title_case_word(kind: DocumentKind) -> (&'static str, &'static str) {
    match kind {
        DocumentKind::Quotation => ("QUOTE", "Quote"),
        DocumentKind::SalesOrder => ("SALES ORDER", "Sales Order"),
    }
}

/// Card posted to Sales when a document gets a payment link.
pub fn document_card(
    kind: DocumentKind,
    name: &str,
    customer_name: &str,
    currency: &str,
    grand_total: &BigDecimal,
    payment_url: &str,
    is_update: bool,
) -> CliqMessage {
    let (upper, word) = title_case_word(kind);
    let (title, text) = if is_update {
        (format!("{upper} UPDATED"), format!("{word} Updated: {name}"))
    } else {
        (format!("NEW {upper}"), format!("New {word}: {name}"))
    };
    let customer = truncate(customer_name, 20, 17);
    let amount = truncate(&format!("{currency} {}", normalize_scale(grand_total)), 15, 12);
    CliqMessage::card(title, THEME, text)
        .with_slide(Slide::fields("Details", [("Customer", customer), ("Amount", amount)]))
        .with_button("Payment Link", payment_url)
}

/// Plain fallback when the card cannot be delivered.
pub fn simple_document_text(kind: DocumentKind, name: &str, is_update: bool) -> String {
    let (_, word) = title_case_word(kind);
    if is_update {
        format!("{word} Updated: {name}")
    } else {
        format!("New {word} Created: {name}")
    }
}

pub fn link_failure_text(kind: DocumentKind, name: &str, error: &str) -> String {
    format!("Payment Link generation failed for {} *{}* - {}", kind.as_str(), name, error)
}

pub fn payment_received_text(
    customer: &str,
    currency: &str,
    amount: &BigDecimal,
    link_id: &str,
    reference: Option<(DocumentKind, &str)>,
) -> String {
    let mut text = format!(
        "Payment received for {customer} - Amount: {}, Payment Link: {link_id}",
        format_amount(currency, amount)
    );
    if let Some((kind, name)) = reference {
        text.push_str(&format!(", {}: {}", kind.as_str(), name));
    }
    text
}

pub fn virtual_account_text(account_id: &str, customer: &str) -> String {
    format!("Virtual Account Created: {account_id} for Customer {customer}")
}

pub fn status_update(
    title: &str,
    details: &[(String, String)],
    assigned_to: Option<&str>,
    link: Option<&str>,
) -> CliqMessage {
    let mention = assigned_to.map(mention).unwrap_or_default();
    let msg = CliqMessage::card(title.to_uppercase(), THEME, format!("**{title}** {mention}").trim_end().to_string())
        .with_slide(Slide::fields("Status Details", details.iter().cloned()));
    match link {
        Some(url) => msg.with_button("View Details", url),
        None => msg,
    }
}

pub fn new_project(
    project_id: &str,
    project_name: Option<&str>,
    assigned_to: Option<&str>,
    customer_name: &str,
    link: &str,
) -> CliqMessage {
    let project_name = project_name.filter(|n| !n.trim().is_empty()).unwrap_or(project_id);
    let assigned = assigned_to.filter(|a| !a.trim().is_empty());
    let mut rows = vec![
        ("Project ID".to_string(), project_id.to_string()),
        ("Project Name".to_string(), project_name.to_string()),
        ("Customer".to_string(), customer_name.to_string()),
    ];
    if let Some(user) = assigned {
        rows.push(("Assigned To".to_string(), user.to_string()));
    }
    let text = format!("**{project_name}** {}", assigned.map(mention).unwrap_or_default());
    let mut msg = CliqMessage::card("NEW PROJECT", THEME, text.trim_end().to_string())
        .with_slide(Slide::fields("Project Summary", rows))
        .with_button("View Project", link);
    msg.sync_message = true;
    msg
}

/// Removes markup tags and `&nbsp;` from rich-text descriptions.
pub fn strip_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_tag = false;
    for ch in input.chars() {
        match ch {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out.replace("&nbsp;", " ").trim().to_string()
}

pub struct TaskCard<'a> {
    pub task_id: &'a str,
    pub task_name: &'a str,
    pub assigned_to: Option<&'a str>,
    pub due_date: Option<&'a str>,
    pub priority: &'a str,
    pub link: &'a str,
    pub description: Option<&'a str>,
}

pub fn task_assignment(task: &TaskCard<'_>) -> CliqMessage {
    let task_name = if task.task_name.trim().is_empty() { task.task_id } else { task.task_name };
    let assigned = task.assigned_to.filter(|a| !a.trim().is_empty());
    let mut rows = vec![
        ("Task ID".to_string(), task.task_id.to_string()),
        ("Task Name".to_string(), task_name.to_string()),
        ("Priority".to_string(), task.priority.to_string()),
    ];
    if let Some(user) = assigned {
        rows.push(("Assigned To".to_string(), user.to_string()));
    }
    if let Some(due) = task.due_date {
        rows.push(("Due Date".to_string(), due.to_string()));
    }
    let text = format!("**{task_name}** {}", assigned.map(mention).unwrap_or_default());
    let mut msg = CliqMessage::card("TASK ASSIGNED: CLICK TO VIEW", "prompt", text.trim_end().to_string())
        .with_slide(Slide::fields("Task Details", rows))
        .with_button("View Task", task.link);
    if let Some(description) = task.description {
        let clean = strip_html(description);
        if !clean.is_empty() {
            let shown = if clean.chars().count() > TASK_DESCRIPTION_LIMIT {
                let head: String = clean.chars().take(TASK_DESCRIPTION_LIMIT).collect();
                format!("{head}...")
            } else {
                clean
            };
            msg = msg.with_slide(Slide::single_column("Task Description", "Description", shown));
        }
    }
    msg.sync_message = true;
    msg
}

pub fn meeting_schedule(
    meeting_title: &str,
    scheduled_by: &str,
    participants: &[String],
    date_time: &str,
    duration: &str,
    link: Option<&str>,
) -> CliqMessage {
    let mentions = participants.iter().map(|p| mention(p)).collect::<Vec<_>>().join(" ");
    let rows = [
        ("Meeting", meeting_title.to_string()),
        ("Scheduled By", scheduled_by.to_string()),
        ("Date & Time", date_time.to_string()),
        ("Duration", duration.to_string()),
        ("Participants", participants.join(", ")),
    ];
    CliqMessage::card(
        format!("MEETING SCHEDULED: {meeting_title}"),
        THEME,
        format!("**MEETING SCHEDULED: {meeting_title}** {mentions}").trim_end().to_string(),
    )
    .with_slide(Slide::fields("Meeting Details", rows))
    .with_button("Join Meeting", link.unwrap_or("#"))
}

pub fn material_request(
    request_id: &str,
    request_title: Option<&str>,
    requested_by: &str,
    items: &[String],
    urgency: &str,
    link: &str,
) -> CliqMessage {
    let title = request_title.filter(|t| !t.trim().is_empty()).unwrap_or(request_id);
    let mut rows = vec![
        ("Request ID".to_string(), request_id.to_string()),
        ("Request Title".to_string(), title.to_string()),
        ("Requested By".to_string(), requested_by.to_string()),
        ("Urgency".to_string(), urgency.to_string()),
        ("Items Count".to_string(), items.len().to_string()),
    ];
    rows.extend(items.iter().enumerate().map(|(i, item)| (format!("Item {}", i + 1), item.clone())));
    let text = format!("**MATERIAL REQUEST: {title}** {}", mention(requested_by));
    let mut msg = CliqMessage::card(format!("MATERIAL REQUEST: {title}"), THEME, text.trim_end().to_string())
        .with_slide(Slide::fields("Request Details", rows))
        .with_button("View Request", link);
    msg.sync_message = true;
    msg
}

pub fn thread_message(parent_message_id: &str, thread_title: &str, text: &str) -> CliqMessage {
    CliqMessage {
        text: text.to_string(),
        thread_message_id: Some(parent_message_id.to_string()),
        thread_title: Some(thread_title.to_string()),
        sync_message: true,
        ..Default::default()
    }
}
