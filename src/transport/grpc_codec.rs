//! Conversions between the protobuf wire types and the replica's own types.

use crate::grpc::{
    ProtoAppendEntriesReply, ProtoAppendEntriesReq, ProtoLogEntry, ProtoRequestVoteReply, ProtoRequestVoteReq,
};
use crate::replica::{
    AppendEntriesInput, AppendEntriesOutput, AppendEntriesRejection, Index, LogEntry, ReplicaId, RequestVoteInput,
    RequestVoteOutput, Term,
};
use bytes::Bytes;
use tonic::Status;

impl From<RequestVoteInput> for ProtoRequestVoteReq {
    fn from(input: RequestVoteInput) -> Self {
        ProtoRequestVoteReq {
            term: input.candidate_term.as_u64(),
            candidate_id: input.candidate_id.into_inner(),
            last_log_index: input.last_log_index.as_u64(),
            last_log_term: input.last_log_term.as_u64(),
        }
    }
}

pub(crate) fn request_vote_input(rpc_request: ProtoRequestVoteReq) -> Result<RequestVoteInput, Status> {
    if rpc_request.candidate_id.is_empty() {
        return Err(Status::invalid_argument("Empty candidate id"));
    }

    Ok(RequestVoteInput {
        candidate_term: Term::new(rpc_request.term),
        candidate_id: ReplicaId::new(rpc_request.candidate_id),
        last_log_index: Index::new(rpc_request.last_log_index),
        last_log_term: Term::new(rpc_request.last_log_term),
    })
}

impl From<RequestVoteOutput> for ProtoRequestVoteReply {
    fn from(output: RequestVoteOutput) -> Self {
        ProtoRequestVoteReply {
            term: output.term.as_u64(),
            vote_granted: output.vote_granted,
        }
    }
}

impl From<ProtoRequestVoteReply> for RequestVoteOutput {
    fn from(rpc_reply: ProtoRequestVoteReply) -> Self {
        RequestVoteOutput {
            term: Term::new(rpc_reply.term),
            vote_granted: rpc_reply.vote_granted,
        }
    }
}

impl From<AppendEntriesInput> for ProtoAppendEntriesReq {
    fn from(input: AppendEntriesInput) -> Self {
        ProtoAppendEntriesReq {
            term: input.leader_term.as_u64(),
            leader_id: input.leader_id.into_inner(),
            prev_log_index: input.previous_log_index.as_u64(),
            prev_log_term: input.previous_log_term.as_u64(),
            entries: input
                .entries
                .into_iter()
                .map(|entry| ProtoLogEntry {
                    term: entry.term.as_u64(),
                    command: entry.command.to_vec(),
                })
                .collect(),
            leader_commit: input.leader_commit_index.as_u64(),
        }
    }
}

pub(crate) fn append_entries_input(rpc_request: ProtoAppendEntriesReq) -> Result<AppendEntriesInput, Status> {
    if rpc_request.leader_id.is_empty() {
        return Err(Status::invalid_argument("Empty leader id"));
    }

    let entries = rpc_request
        .entries
        .into_iter()
        .map(|proto_entry| LogEntry {
            term: Term::new(proto_entry.term),
            command: Bytes::from(proto_entry.command),
        })
        .collect();

    Ok(AppendEntriesInput {
        leader_term: Term::new(rpc_request.term),
        leader_id: ReplicaId::new(rpc_request.leader_id),
        previous_log_index: Index::new(rpc_request.prev_log_index),
        previous_log_term: Term::new(rpc_request.prev_log_term),
        entries,
        leader_commit_index: Index::new(rpc_request.leader_commit),
    })
}

impl From<AppendEntriesOutput> for ProtoAppendEntriesReply {
    fn from(output: AppendEntriesOutput) -> Self {
        let term = output.term.as_u64();
        match output.result {
            Ok(()) => ProtoAppendEntriesReply {
                term,
                success: true,
                conflicting_term: 0,
                log_length: 0,
            },
            Err(AppendEntriesRejection::StaleTerm) => ProtoAppendEntriesReply {
                term,
                success: false,
                conflicting_term: 0,
                log_length: 0,
            },
            Err(AppendEntriesRejection::LogTooShort { log_length }) => ProtoAppendEntriesReply {
                term,
                success: false,
                conflicting_term: 0,
                log_length,
            },
            Err(AppendEntriesRejection::ConflictingTerm { term: conflicting_term }) => ProtoAppendEntriesReply {
                term,
                success: false,
                conflicting_term: conflicting_term.as_u64(),
                log_length: 0,
            },
        }
    }
}

pub(crate) fn append_entries_output(rpc_reply: ProtoAppendEntriesReply) -> Result<AppendEntriesOutput, String> {
    let result = match (rpc_reply.success, rpc_reply.conflicting_term, rpc_reply.log_length) {
        (true, 0, 0) => Ok(()),
        (true, _, _) => return Err("Success reply carries rejection hints".to_string()),
        (false, 0, 0) => Err(AppendEntriesRejection::StaleTerm),
        (false, 0, log_length) => Err(AppendEntriesRejection::LogTooShort { log_length }),
        (false, conflicting_term, 0) => Err(AppendEntriesRejection::ConflictingTerm {
            term: Term::new(conflicting_term),
        }),
        (false, _, _) => return Err("Rejection carries both conflicting term and log length".to_string()),
    };

    Ok(AppendEntriesOutput {
        term: Term::new(rpc_reply.term),
        result,
    })
}
