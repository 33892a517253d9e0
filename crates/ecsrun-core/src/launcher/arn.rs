//! Task ARN parsing and console URL formatting.

use crate::error::TailError;

/// Extract the task id from an ECS task ARN.
///
/// Accepts `arn:aws:ecs:<region>:<account>:task/<id>` and the long form
/// `arn:aws:ecs:<region>:<account>:task/<cluster>/<id>`; the id is the last
/// path segment in both cases.
pub fn task_id_from_arn(arn: &str) -> Result<String, TailError> {
    let unsupported = || TailError::UnsupportedArn(arn.to_string());

    let mut parts = arn.splitn(6, ':');
    let (Some("arn"), Some("aws"), Some("ecs"), Some(region), Some(account), Some(resource)) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return Err(unsupported());
    };

    if region.is_empty() || account.is_empty() {
        return Err(unsupported());
    }

    let path = resource.strip_prefix("task/").ok_or_else(unsupported)?;
    match path.rsplit('/').next() {
        Some(id) if !id.is_empty() => Ok(id.to_string()),
        _ => Err(unsupported()),
    }
}

/// Console URL for a task's detail page.
pub fn task_console_url(region: &str, cluster: &str, task_id: &str) -> String {
    format!(
        "https://{region}.console.aws.amazon.com/ecs/home?region={region}#/clusters/{cluster}/tasks/{task_id}/details"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_short_arn() {
        let id = task_id_from_arn("arn:aws:ecs:us-east-1:123456789012:task/abc123").unwrap();
        assert_eq!(id, "abc123");
    }

    #[test]
    fn parses_long_arn_with_cluster() {
        let id = task_id_from_arn(
            "arn:aws:ecs:eu-west-1:123456789012:task/default/0f1e2d3c4b5a69788796a5b4c3d2e1f0",
        )
        .unwrap();
        assert_eq!(id, "0f1e2d3c4b5a69788796a5b4c3d2e1f0");
    }

    #[test]
    fn rejects_non_task_resource() {
        let err = task_id_from_arn("arn:aws:ecs:us-east-1:123456789012:service/web").unwrap_err();
        assert!(matches!(err, TailError::UnsupportedArn(ref a) if a.contains("service/web")));
    }

    #[test]
    fn rejects_other_partitions_and_services() {
        assert!(task_id_from_arn("arn:aws:ec2:us-east-1:1:task/abc").is_err());
        assert!(task_id_from_arn("arn:aws-cn:ecs:cn-north-1:1:task/abc").is_err());
    }

    #[test]
    fn rejects_empty_segments() {
        assert!(task_id_from_arn("arn:aws:ecs::123:task/abc").is_err());
        assert!(task_id_from_arn("arn:aws:ecs:us-east-1::task/abc").is_err());
        assert!(task_id_from_arn("arn:aws:ecs:us-east-1:123:task/").is_err());
        assert!(task_id_from_arn("not an arn").is_err());
    }

    #[test]
    fn console_url_format() {
        assert_eq!(
            task_console_url("us-east-1", "default", "abc123"),
            "https://us-east-1.console.aws.amazon.com/ecs/home?region=us-east-1#/clusters/default/tasks/abc123/details"
        );
    }
}
