use std::net::IpAddr;
use std::str::FromStr;
use std::time::Duration;

use hickory_proto::op::{Message, MessageType, OpCode, Query as Question, ResponseCode};
use hickory_proto::rr::rdata::{A, AAAA, PTR};
use hickory_proto::rr::{Name, RData, Record, RecordType as WireType};
use sans_domain::{
    ClassificationRule, GroupId, PoisonFilter, Query, QueryOrigin, RecordType, RuleMatcher,
    RuntimeSnapshot, UpstreamEndpoint, UpstreamGroup,
};

pub const CLIENT_ID: u16 = 0xbeef;

pub fn request(name: &str, record_type: WireType) -> Message {
    let mut msg = Message::new();
    msg.set_id(CLIENT_ID)
        .set_message_type(MessageType::Query)
        .set_op_code(OpCode::Query)
        .set_recursion_desired(true);
    msg.add_query(Question::query(Name::from_str(name).unwrap(), record_type));
    msg
}

pub fn query_for(msg: &Message) -> Query {
    let question = &msg.queries()[0];
    Query::new(
        msg.id(),
        &question.name().to_ascii(),
        RecordType::from_u16(u16::from(question.query_type())),
        u16::from(question.query_class()),
        QueryOrigin::Udp {
            peer: "127.0.0.1:40000".parse().unwrap(),
        },
    )
}

/// Upstream-style reply with its own id, so tests can check the client id
/// is restored.
pub fn answer(request: &Message, ips: &[&str]) -> Message {
    let mut resp = reply(request, ResponseCode::NoError);
    let name = request.queries()[0].name().clone();
    for ip in ips {
        let rdata = match IpAddr::from_str(ip).unwrap() {
            IpAddr::V4(v4) => RData::A(A(v4)),
            IpAddr::V6(v6) => RData::AAAA(AAAA(v6)),
        };
        resp.add_answer(Record::from_rdata(name.clone(), 300, rdata));
    }
    resp
}

pub fn ptr_answer(request: &Message, target: &str) -> Message {
    let mut resp = reply(request, ResponseCode::NoError);
    let name = request.queries()[0].name().clone();
    resp.add_answer(Record::from_rdata(
        name,
        300,
        RData::PTR(PTR(Name::from_str(target).unwrap())),
    ));
    resp
}

pub fn reply(request: &Message, rcode: ResponseCode) -> Message {
    let mut resp = Message::new();
    resp.set_id(request.id().wrapping_add(1))
        .set_message_type(MessageType::Response)
        .set_op_code(OpCode::Query)
        .set_recursion_desired(true)
        .set_recursion_available(true)
        .set_response_code(rcode);
    resp.add_queries(request.queries().to_vec());
    resp
}

pub fn answer_ips(msg: &Message) -> Vec<IpAddr> {
    msg.answers()
        .iter()
        .filter_map(|r| match r.data() {
            Some(RData::A(a)) => Some(IpAddr::V4(a.0)),
            Some(RData::AAAA(aaaa)) => Some(IpAddr::V6(aaaa.0)),
            _ => None,
        })
        .collect()
}

pub fn group(id: GroupId, name: &str, trust: u8) -> UpstreamGroup {
    let endpoint: UpstreamEndpoint = format!("udp://192.0.2.{}:53", id + 1).parse().unwrap();
    UpstreamGroup::new(id, name, vec![endpoint])
        .with_trust(trust)
        .with_timeout(Duration::from_millis(500))
}

pub fn suffix_rule(pattern: &str, groups: Vec<GroupId>, index: usize) -> ClassificationRule {
    ClassificationRule::new(RuleMatcher::Suffix(pattern.into()), groups, 1, index)
}

pub fn reverse_rule(groups: Vec<GroupId>, index: usize) -> ClassificationRule {
    ClassificationRule::new(RuleMatcher::Reverse(None), groups, 1, index)
}

pub fn snapshot(
    groups: Vec<UpstreamGroup>,
    rules: Vec<ClassificationRule>,
    default_group: GroupId,
) -> RuntimeSnapshot {
    let query_deadline = groups
        .iter()
        .map(|g| g.timeout)
        .max()
        .unwrap_or(Duration::from_secs(2));
    RuntimeSnapshot {
        groups,
        rules,
        poison: PoisonFilter::builtin(),
        default_group,
        probe: None,
        query_deadline,
        udp_retransmit: Duration::from_millis(200),
    }
}
