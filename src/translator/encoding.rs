//! Static parts of the generated logic program: the generic encoding
//! preamble and one rule block per template family.
//!
//! Everything is expressed over `trace(Activity, Position)` with positions
//! `1..t` (`t` is passed to the solver as a constant). Template instances
//! are guarded by their index: the dynamic part of the program contributes
//! `template(I, family, operands...)` facts plus per-instance
//! `activation_condition(I,T)` / `correlation_condition(I,T)` rules, and the
//! blocks below derive `bad(I)` whenever instance `I` is broken. Positive
//! instances forbid `bad(I)`; instances marked `violated(I)` require it.

/// Generic rules: trace shape, attribute assignment, goal enforcement.
pub const ENCODING_PREAMBLE: &str = r"% ---- encoding preamble ----
time(1..t).
1 { trace(A,T) : activity(A) } 1 :- time(T).
1 { assigned_value(K,V,T) : value(K,V) } 1 :- trace(A,T), has_attribute(A,K).

:- template(I,_,_), not violated(I), bad(I).
:- template(I,_,_,_), not violated(I), bad(I).
:- violated(I), not bad(I).

#show trace/2.
#show assigned_value/3.
";

/// One rule block per template family.
pub const TEMPLATE_RULES: &str = r"% ---- template rules ----
% existence family
bad(I) :- template(I, existence, A), cardinality(I, N), #count{ T : activation_condition(I,T) } < N.
bad(I) :- template(I, absence, A), cardinality(I, N), #count{ T : activation_condition(I,T) } >= N.
bad(I) :- template(I, exactly, A), cardinality(I, N), C = #count{ T : activation_condition(I,T) }, C != N.
bad(I) :- template(I, init, A), not activation_condition(I, 1).

% choice family
choice_ok(I) :- template(I, choice, A, B), activation_condition(I,T).
choice_ok(I) :- template(I, choice, A, B), correlation_condition(I,T).
bad(I) :- template(I, choice, A, B), not choice_ok(I).
bad(I) :- template(I, exclusive_choice, A, B), activation_condition(I,T1), correlation_condition(I,T2).

% relation family
bad(I) :- template(I, responded_existence, A, B), activation_condition(I,T1), #count{ T2 : correlation_condition(I,T2) } = 0.
resp_ok(I,T1) :- template(I, response, A, B), activation_condition(I,T1), correlation_condition(I,T2), T1 < T2.
bad(I) :- template(I, response, A, B), activation_condition(I,T1), not resp_ok(I,T1).
altresp_ok(I,T1) :- template(I, alternate_response, A, B), activation_condition(I,T1), correlation_condition(I,T2), T1 < T2, #count{ T : activation_condition(I,T), T1 < T, T < T2 } = 0.
bad(I) :- template(I, alternate_response, A, B), activation_condition(I,T1), not altresp_ok(I,T1).
chainresp_ok(I,T) :- template(I, chain_response, A, B), activation_condition(I,T), correlation_condition(I,T+1).
bad(I) :- template(I, chain_response, A, B), activation_condition(I,T), not chainresp_ok(I,T).
prec_ok(I,T2) :- template(I, precedence, A, B), activation_condition(I,T2), correlation_condition(I,T1), T1 < T2.
bad(I) :- template(I, precedence, A, B), activation_condition(I,T2), not prec_ok(I,T2).
altprec_ok(I,T2) :- template(I, alternate_precedence, A, B), activation_condition(I,T2), correlation_condition(I,T1), T1 < T2, #count{ T : activation_condition(I,T), T1 < T, T < T2 } = 0.
bad(I) :- template(I, alternate_precedence, A, B), activation_condition(I,T2), not altprec_ok(I,T2).
chainprec_ok(I,T) :- template(I, chain_precedence, A, B), activation_condition(I,T), correlation_condition(I,T-1).
bad(I) :- template(I, chain_precedence, A, B), activation_condition(I,T), not chainprec_ok(I,T).

% negative relation family
bad(I) :- template(I, not_responded_existence, A, B), activation_condition(I,T1), correlation_condition(I,T2).
bad(I) :- template(I, not_response, A, B), activation_condition(I,T1), correlation_condition(I,T2), T1 < T2.
bad(I) :- template(I, not_chain_response, A, B), activation_condition(I,T), correlation_condition(I,T+1).
bad(I) :- template(I, not_precedence, A, B), activation_condition(I,T2), correlation_condition(I,T1), T1 < T2.
bad(I) :- template(I, not_chain_precedence, A, B), activation_condition(I,T), correlation_condition(I,T-1).
";
