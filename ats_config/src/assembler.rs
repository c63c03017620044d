// Copyright 2024 Toolchain Labs, Inc. All rights reserved.
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use chrono::{DateTime, Utc};

use crate::engine::ResolvedServer;
use crate::overrides::ResolvedDeliveryService;
use crate::parameters::ToolIdentity;
use crate::topology::Role;

/// Format of the generation timestamp in the header, e.g. `2024-03-01 12:30:05 UTC`.
pub const HEADER_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S %Z";

const ORIGIN_FQDN_SEPARATOR: &str = "         ";
const XML_ID_SEPARATOR: &str = "      ";

/// Who generated a file, for whom, and when.
pub struct Provenance<'a> {
    pub tool: &'a ToolIdentity,
    pub host_name: &'a str,
    pub generated_at: DateTime<Utc>,
}

impl Provenance<'_> {
    pub fn header(&self) -> String {
        format!(
            "# DO NOT EDIT - Generated for {} by {} ({}) at {}\n",
            self.host_name,
            self.tool.name,
            self.tool.url,
            self.generated_at.format(HEADER_TIMESTAMP_FORMAT),
        )
    }
}

/// One parent-selection directive. An unset query string policy renders as an empty field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DirectiveLine<'a> {
    pub origin_fqdn: &'a str,
    pub xml_id: &'a str,
    pub qstring_handling: Option<&'a str>,
}

impl<'a> From<&'a ResolvedDeliveryService> for DirectiveLine<'a> {
    fn from(resolved: &'a ResolvedDeliveryService) -> Self {
        DirectiveLine {
            origin_fqdn: &resolved.delivery_service.org_server_fqdn,
            xml_id: &resolved.delivery_service.xml_id,
            qstring_handling: resolved.overrides.qstring_handling.as_deref(),
        }
    }
}

/// Builds the text of a `parent.config` file.
///
/// Layout: header line, ATS major version, server type, then the directives. Version, type and
/// the first directive are not separated from each other; consumers of the existing files
/// depend on that.
pub struct ParentConfigWriter {
    text: String,
}

impl ParentConfigWriter {
    pub fn new(provenance: &Provenance<'_>, ats_version: &str, type_name: &str) -> Self {
        let mut text = provenance.header();
        text.push_str(ats_version);
        text.push_str(type_name);
        ParentConfigWriter { text }
    }

    pub fn directive(&mut self, line: DirectiveLine<'_>) {
        self.text.push_str(line.origin_fqdn);
        self.text.push_str(ORIGIN_FQDN_SEPARATOR);
        self.text.push_str(line.xml_id);
        self.text.push_str(XML_ID_SEPARATOR);
        self.text.push_str(line.qstring_handling.unwrap_or_default());
        self.text.push('\n');
    }

    pub fn finish(self) -> String {
        self.text
    }
}

/// Assemble the `parent.config` text for a resolved server.
///
/// Origin-tier servers only get directives for delivery services that have a profile; edge
/// servers get one for every assigned delivery service.
pub fn assemble(
    provenance: &Provenance<'_>,
    resolved: &ResolvedServer,
    delivery_services: &[ResolvedDeliveryService],
) -> String {
    let mut writer = ParentConfigWriter::new(
        provenance,
        &resolved.ats_version,
        &resolved.server.type_name,
    );

    match resolved.role {
        Role::OriginTier => {
            log::debug!("{}: mid found", resolved.server.host_name);
            for rds in delivery_services {
                let profile_id = match rds.delivery_service.profile() {
                    Some(id) => id,
                    None => {
                        log::debug!(
                            "{}: skipping {} without profile",
                            resolved.server.host_name,
                            rds.delivery_service.xml_id
                        );
                        continue;
                    }
                };
                log::debug!(
                    "{}: found a profile id of {profile_id}",
                    rds.delivery_service.xml_id
                );
                if let Some(algorithm) = &rds.overrides.mso_algorithm {
                    log::debug!(
                        "{}: found an algorithm of {algorithm}",
                        rds.delivery_service.xml_id
                    );
                }
                writer.directive(DirectiveLine::from(rds));
            }
        }
        Role::EdgeTier => {
            log::debug!("{}: not a mid", resolved.server.host_name);
            for rds in delivery_services {
                writer.directive(DirectiveLine::from(rds));
            }
        }
    }

    writer.finish()
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{assemble, DirectiveLine, ParentConfigWriter, Provenance};
    use crate::engine::ResolvedServer;
    use crate::model::{DeliveryService, Server};
    use crate::overrides::{OverrideSet, ResolvedDeliveryService};
    use crate::parameters::ToolIdentity;
    use crate::topology::{ParentCacheGroups, Role};

    fn tool() -> ToolIdentity {
        ToolIdentity {
            name: "Traffic Ops".to_owned(),
            url: "https://tm.example.com/".to_owned(),
        }
    }

    fn provenance(tool: &ToolIdentity) -> Provenance<'_> {
        Provenance {
            tool,
            host_name: "cache-1",
            generated_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 5).unwrap(),
        }
    }

    fn resolved_server(type_name: &str) -> ResolvedServer {
        let server = Server {
            id: 1,
            host_name: "cache-1".to_owned(),
            domain_name: "example.com".to_owned(),
            tcp_port: 80,
            cache_group_id: 100,
            cache_group: "cg".to_owned(),
            profile_id: 10,
            profile: "ATS".to_owned(),
            cdn_id: 1,
            cdn: "cdn1".to_owned(),
            status: "REPORTED".to_owned(),
            type_name: type_name.to_owned(),
            update_pending: false,
            package_version: Some("7.1.2.el7".to_owned()),
        };
        ResolvedServer {
            role: Role::of(&server),
            ats_version: "7".to_owned(),
            parents: ParentCacheGroups::default(),
            server,
        }
    }

    fn rds(
        xml_id: &str,
        profile_id: Option<i64>,
        qstring_handling: Option<&str>,
    ) -> ResolvedDeliveryService {
        ResolvedDeliveryService {
            delivery_service: DeliveryService {
                id: 1,
                xml_id: xml_id.to_owned(),
                cdn_id: 1,
                org_server_fqdn: format!("http://{xml_id}.origin.example.com"),
                type_name: "HTTP".to_owned(),
                qstring_ignore: 0,
                origin_shield: None,
                multi_site_origin: false,
                profile_id,
            },
            overrides: OverrideSet {
                qstring_handling: qstring_handling.map(str::to_owned),
                ..OverrideSet::default()
            },
        }
    }

    #[test]
    fn header_line() {
        let tool = tool();
        assert_eq!(
            provenance(&tool).header(),
            "# DO NOT EDIT - Generated for cache-1 by Traffic Ops (https://tm.example.com/) at 2024-03-01 12:30:05 UTC\n"
        );
    }

    #[test]
    fn directive_line_layout() {
        let tool = tool();
        let mut writer = ParentConfigWriter::new(&provenance(&tool), "8", "EDGE");
        writer.directive(DirectiveLine {
            origin_fqdn: "http://a.example.com",
            xml_id: "a",
            qstring_handling: Some("consider"),
        });
        writer.directive(DirectiveLine {
            origin_fqdn: "http://b.example.com",
            xml_id: "b",
            qstring_handling: None,
        });

        let text = writer.finish();
        let body = text.split_once('\n').unwrap().1;
        assert_eq!(
            body,
            "8EDGEhttp://a.example.com         a      consider\nhttp://b.example.com         b      \n"
        );
    }

    #[test]
    fn edge_tier_emits_every_delivery_service() {
        let tool = tool();
        let services = vec![
            rds("ds1", Some(20), Some("ignore")),
            rds("ds2", None, None),
        ];

        let text = assemble(&provenance(&tool), &resolved_server("EDGE"), &services);
        let body = text.split_once('\n').unwrap().1;
        assert_eq!(
            body,
            "7EDGEhttp://ds1.origin.example.com         ds1      ignore\n\
             http://ds2.origin.example.com         ds2      \n"
        );
    }

    #[test]
    fn origin_tier_skips_delivery_services_without_profile() {
        let tool = tool();
        let services = vec![
            rds("ds1", Some(20), Some("ignore")),
            rds("ds2", None, None),
            rds("ds3", Some(0), None),
            rds("ds4", Some(21), None),
        ];

        let text = assemble(&provenance(&tool), &resolved_server("MID"), &services);
        let body = text.split_once('\n').unwrap().1;
        assert_eq!(
            body,
            "7MIDhttp://ds1.origin.example.com         ds1      ignore\n\
             http://ds4.origin.example.com         ds4      \n"
        );
    }

    #[test]
    fn mso_algorithm_does_not_change_the_line() {
        let tool = tool();
        let plain = vec![rds("ds1", Some(20), Some("ignore"))];
        let mut with_mso = plain.clone();
        with_mso[0].overrides.mso_algorithm = Some("consistent_hash".to_owned());

        let server = resolved_server("MID");
        assert_eq!(
            assemble(&provenance(&tool), &server, &plain),
            assemble(&provenance(&tool), &server, &with_mso)
        );
    }

    #[test]
    fn no_delivery_services() {
        let tool = tool();
        let text = assemble(&provenance(&tool), &resolved_server("EDGE"), &[]);
        assert!(text.ends_with(" UTC\n7EDGE"));
    }
}
