mod test_join_sequences_converge;
