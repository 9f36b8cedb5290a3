//! Resolver composition
//!
//! Two ways of combining child resolvers into one: [`MergeResolver`]
//! queries every child and concatenates their answers, [`FirstResolver`]
//! stops at the first child that writes anything. The server composes its
//! pipeline from these two.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::resolver::{Request, Resolver, ResponseWriter, ResponseWriterHook};

fn fmt_children(
    f: &mut fmt::Formatter<'_>,
    name: &str,
    children: &[Arc<dyn Resolver>],
) -> fmt::Result {
    let names: Vec<String> = children.iter().map(|r| r.to_string()).collect();
    write!(f, "{}[{}]", name, names.join(" "))
}

async fn close_children(children: &[Arc<dyn Resolver>]) -> Result<()> {
    let mut result = Ok(());
    for child in children {
        if let Err(err) = child.close().await {
            if result.is_ok() {
                result = Err(err);
            }
        }
    }
    result
}

/// Resolver that merges the responses of all of its children.
///
/// Children are queried in order and every answer is written through; an
/// error from any child aborts the composite.
pub struct MergeResolver(Vec<Arc<dyn Resolver>>);

impl MergeResolver {
    /// Compose `children` into a merging resolver.
    pub fn new(children: Vec<Arc<dyn Resolver>>) -> Self {
        MergeResolver(children)
    }
}

#[async_trait]
impl Resolver for MergeResolver {
    async fn resolve(&self, w: &mut dyn ResponseWriter, req: &Request) -> Result<()> {
        for child in &self.0 {
            child.resolve(w, req).await?;
        }
        Ok(())
    }

    fn recursion_available(&self) -> bool {
        self.0.iter().any(|r| r.recursion_available())
    }

    async fn close(&self) -> Result<()> {
        close_children(&self.0).await
    }
}

impl fmt::Display for MergeResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_children(f, "MergeResolver", &self.0)
    }
}

/// Resolver that responds with only the first child that writes a record.
///
/// Children are tried in order; the first one that writes anything
/// terminates the sequence. An error from any invoked child aborts.
pub struct FirstResolver(Vec<Arc<dyn Resolver>>);

impl FirstResolver {
    /// Compose `children` into a first-hit resolver.
    pub fn new(children: Vec<Arc<dyn Resolver>>) -> Self {
        FirstResolver(children)
    }
}

#[async_trait]
impl Resolver for FirstResolver {
    async fn resolve(&self, w: &mut dyn ResponseWriter, req: &Request) -> Result<()> {
        let mut resolved = false;

        for child in &self.0 {
            {
                let mut hook = ResponseWriterHook::new(&mut *w, |_| {
                    resolved = true;
                    Ok(())
                });
                child.resolve(&mut hook, req).await?;
            }

            if resolved {
                break;
            }
        }

        Ok(())
    }

    fn recursion_available(&self) -> bool {
        self.0.iter().any(|r| r.recursion_available())
    }

    async fn close(&self) -> Result<()> {
        close_children(&self.0).await
    }
}

impl fmt::Display for FirstResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_children(f, "FirstResolver", &self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::RecordType;
    use crate::error::Error;
    use crate::record::{Domain, Record};
    use crate::resolver::{ResponseCallback, StaticResolver};

    fn static_resolver(lines: &[&str]) -> Arc<dyn Resolver> {
        let records: Vec<Record> = lines.iter().map(|l| l.parse().unwrap()).collect();
        Arc::new(StaticResolver::new(records))
    }

    fn request(name: &str, qtype: RecordType) -> Request {
        Request::new(Domain::new(name).unwrap(), qtype, false)
    }

    async fn collect(resolver: &dyn Resolver, req: &Request) -> Vec<String> {
        let mut records = Vec::new();
        let mut writer = ResponseCallback::new(|r| {
            records.push(r.to_string());
            Ok(())
        });
        resolver.resolve(&mut writer, req).await.unwrap();
        drop(writer);
        records
    }

    struct FailResolver;

    impl fmt::Display for FailResolver {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "FailResolver")
        }
    }

    #[async_trait]
    impl Resolver for FailResolver {
        async fn resolve(&self, _: &mut dyn ResponseWriter, _: &Request) -> Result<()> {
            Err(Error::external("broken resolver"))
        }

        fn recursion_available(&self) -> bool {
            false
        }
    }

    #[tokio::test]
    async fn merge_concatenates_children() {
        let resolver = MergeResolver::new(vec![
            static_resolver(&["example.com. 10 IN A 127.0.0.1"]),
            static_resolver(&["example.com. 10 IN A 127.0.0.2"]),
        ]);

        let records = collect(&resolver, &request("example.com.", RecordType::A)).await;
        assert_eq!(
            records,
            vec![
                "example.com. 10 IN A 127.0.0.1",
                "example.com. 10 IN A 127.0.0.2",
            ]
        );
    }

    #[tokio::test]
    async fn first_stops_at_first_hit() {
        let resolver = FirstResolver::new(vec![
            static_resolver(&["example.com. 10 IN A 127.0.0.1"]),
            static_resolver(&["example.com. 10 IN A 127.0.0.2"]),
        ]);

        let records = collect(&resolver, &request("example.com.", RecordType::A)).await;
        assert_eq!(records, vec!["example.com. 10 IN A 127.0.0.1"]);
    }

    #[tokio::test]
    async fn first_falls_through_empty_children() {
        let resolver = FirstResolver::new(vec![
            static_resolver(&["other.com. 10 IN A 127.0.0.9"]),
            static_resolver(&["example.com. 10 IN A 127.0.0.2"]),
        ]);

        let records = collect(&resolver, &request("example.com.", RecordType::A)).await;
        assert_eq!(records, vec!["example.com. 10 IN A 127.0.0.2"]);
    }

    #[tokio::test]
    async fn child_error_aborts() {
        let merge = MergeResolver::new(vec![
            Arc::new(FailResolver),
            static_resolver(&["example.com. 10 IN A 127.0.0.1"]),
        ]);

        let mut writer = ResponseCallback::new(|_| Ok(()));
        let req = request("example.com.", RecordType::A);
        assert!(merge.resolve(&mut writer, &req).await.is_err());

        let first = FirstResolver::new(vec![Arc::new(FailResolver)]);
        assert!(first.resolve(&mut writer, &req).await.is_err());
    }

    #[tokio::test]
    async fn recursion_available_is_a_disjunction() {
        let none = MergeResolver::new(vec![static_resolver(&["example.com. 10 IN A 127.0.0.1"])]);
        assert!(!none.recursion_available());
    }
}
